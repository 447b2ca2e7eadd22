//! The exclusion memo: identifiers that were resolved or rejected by hand
//! and must never be put in front of an operator again.
//!
//! The backing file holds one identifier per line and is only ever
//! appended to. It is read completely when opened and then kept open in
//! append mode for the rest of the run.
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::corpus::OtherHasher;
use crate::error::Result;

pub struct ExclusionMemo {
    path: PathBuf,
    entries: HashSet<String, OtherHasher>,
    log: File,
    // a hand-edited file may lack the final line break
    unterminated: bool,
}

impl ExclusionMemo {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = if path.exists() { fs::read_to_string(&path)? } else { String::new() };
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|identifier| !identifier.is_empty())
            .map(str::to_string)
            .collect::<HashSet<String, OtherHasher>>();
        let unterminated = !text.is_empty() && !text.ends_with('\n');
        let log = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), entries = entries.len(), "exclusion memo loaded");
        Ok(Self { path, entries, log, unterminated })
    }
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains(identifier.trim())
    }
    /// Appends `identifier` to the memo. Returns `false` if it was already there.
    pub fn record(&mut self, identifier: &str) -> Result<bool> {
        let identifier = identifier.trim();
        if identifier.is_empty() || self.entries.contains(identifier) {
            return Ok(false);
        }
        if self.unterminated {
            writeln!(self.log)?;
            self.unterminated = false;
        }
        writeln!(self.log, "{identifier}")?;
        self.log.flush()?;
        self.entries.insert(identifier.to_string());
        debug!(%identifier, "excluded");
        Ok(true)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}
