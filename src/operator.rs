//! The person at the console who settles deferred cases.
use std::io::{self, BufRead, Write};

use crate::corpus::RecordId;
use crate::engine::Deferral;
use crate::error::{Result, TypelinkError};

/// Corrections made before approving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edit {
    /// The name to link, when not the one proposed.
    pub record: Option<RecordId>,
    /// Type specimen text written as given.
    pub type_specimen: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    EditThenApprove(Edit),
    Reject,
    /// Reject, and never show this identifier again.
    RejectAndExclude,
}

pub trait Operator {
    /// Returns [`TypelinkError::OperatorAbort`] when the operator quits.
    fn present(&mut self, deferral: &Deferral) -> Result<Verdict>;
}

/// Line-oriented prompt over any reader and writer.
pub struct ConsoleOperator<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        self.read_line()?.ok_or(TypelinkError::OperatorAbort)
    }

    fn show(&mut self, deferral: &Deferral) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "{}: {}", deferral.identifier, deferral.reason)?;
        writeln!(self.output, "  export names {}", deferral.candidate)?;
        for (index, record) in deferral.records.iter().enumerate() {
            writeln!(self.output, "  [{}] {record}", index + 1)?;
        }
        for tag in &deferral.tags {
            writeln!(self.output, "  + {tag}")?;
        }
        Ok(())
    }

    fn edit(&mut self, deferral: &Deferral) -> Result<Edit> {
        let mut edit = Edit::default();
        let choice = self.ask("name (list number or #id, empty to keep): ")?;
        if let Some(id) = choice.strip_prefix('#') {
            edit.record = id.trim().parse().ok();
        } else if let Ok(index) = choice.parse::<usize>() {
            edit.record = deferral.records.get(index.wrapping_sub(1)).map(|r| r.id());
        }
        let text = self.ask("type specimen (empty to keep): ")?;
        if !text.is_empty() {
            edit.type_specimen = Some(text);
        }
        Ok(edit)
    }
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn present(&mut self, deferral: &Deferral) -> Result<Verdict> {
        self.show(deferral)?;
        let verdict = loop {
            let answer = self.ask("[a]pprove, [e]dit, [r]eject, e[x]clude, [q]uit? ")?;
            match answer.to_lowercase().as_str() {
                "a" => break Verdict::Approve,
                "e" => break Verdict::EditThenApprove(self.edit(deferral)?),
                "r" => break Verdict::Reject,
                "x" => break Verdict::RejectAndExclude,
                "q" => return Err(TypelinkError::OperatorAbort),
                _ => writeln!(self.output, "unrecognized answer {answer:?}")?,
            }
        };
        writeln!(self.output, "{} -> {verdict:?}", deferral.identifier)?;
        Ok(verdict)
    }
}
