//! Specimen citation grammar.
//!
//! A type specimen is cited as a comma-separated list of entries, each a
//! single specimen or an inclusive range (`USNM 1 through USNM 5`). A
//! specimen is one catalog identifier, optionally followed by a free-text
//! comment and by cross-references to identifiers it formerly had (`(= ..)`),
//! identifiers it was transferred to (`(=> ..)`) and co-located duplicates
//! (`(+ ..)`):
//!
//! ```text
//! BMNH 1900.1.1.1 (skull only!) (= AMNH 42), MVZ (unnumbered), MVZ:Mamm:12345
//! ```
//!
//! Parsing and printing are exact inverses. Institution codes are taken
//! verbatim; whether `XYZ` is a real collection is not this module's business.
use std::fmt;

use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser;

use crate::error::{Result, TypelinkError};

#[derive(Parser)]
#[grammar = "specimen.pest"]
struct SpecimenParser;

// ------------- Identifier -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecimenIdentifier {
    /// `<INST> <NUM>`, kept as the full text.
    Simple(String),
    /// `<INST> (<QUALIFIER>)`, e.g. `MVZ (unnumbered)`.
    Special { institution: String, qualifier: String },
    /// `<INST>:<DEPT>:<NUM>`, e.g. `MVZ:Mamm:12345`.
    Triplet { institution: String, department: String, number: String },
}

impl SpecimenIdentifier {
    pub fn institution(&self) -> &str {
        match self {
            Self::Simple(text) => text.split_once(' ').map_or(text.as_str(), |(inst, _)| inst),
            Self::Special { institution, .. } | Self::Triplet { institution, .. } => institution,
        }
    }
    /// The bare catalog number, if the identifier has one.
    pub fn catalog_number(&self) -> Option<&str> {
        match self {
            Self::Simple(text) => text.split_once(' ').map(|(_, number)| number),
            Self::Special { .. } => None,
            Self::Triplet { number, .. } => Some(number),
        }
    }
}

impl fmt::Display for SpecimenIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Simple(text) => write!(f, "{text}"),
            Self::Special { institution, qualifier } => write!(f, "{institution} ({qualifier})"),
            Self::Triplet { institution, department, number } => {
                write!(f, "{institution}:{department}:{number}")
            }
        }
    }
}

// ------------- Specimen -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specimen {
    pub base: SpecimenIdentifier,
    pub comment: Option<String>,
    pub former: Vec<SpecimenIdentifier>,
    pub future: Vec<SpecimenIdentifier>,
    pub extra: Vec<SpecimenIdentifier>,
}

impl Specimen {
    pub fn new(base: SpecimenIdentifier) -> Self {
        Self {
            base,
            comment: None,
            former: Vec::new(),
            future: Vec::new(),
            extra: Vec::new(),
        }
    }
    /// The primary identifier followed by every cross-referenced one.
    pub fn identifiers(&self) -> impl Iterator<Item = &SpecimenIdentifier> {
        std::iter::once(&self.base)
            .chain(self.former.iter())
            .chain(self.future.iter())
            .chain(self.extra.iter())
    }
}

impl fmt::Display for Specimen {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.base)?;
        if let Some(comment) = &self.comment {
            write!(f, " ({comment}!)")?;
        }
        for former in &self.former {
            write!(f, " (= {former})")?;
        }
        for future in &self.future {
            write!(f, " (=> {future})")?;
        }
        for extra in &self.extra {
            write!(f, " (+ {extra})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecimenRange {
    pub start: Specimen,
    pub end: Specimen,
}

impl fmt::Display for SpecimenRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} through {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnySpecimen {
    Specimen(Specimen),
    Range(SpecimenRange),
}

impl AnySpecimen {
    pub fn specimens(&self) -> Vec<&Specimen> {
        match self {
            Self::Specimen(specimen) => vec![specimen],
            Self::Range(range) => vec![&range.start, &range.end],
        }
    }
}

impl fmt::Display for AnySpecimen {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Specimen(specimen) => write!(f, "{specimen}"),
            Self::Range(range) => write!(f, "{range}"),
        }
    }
}

impl From<SpecimenIdentifier> for AnySpecimen {
    fn from(identifier: SpecimenIdentifier) -> Self {
        Self::Specimen(Specimen::new(identifier))
    }
}

// ------------- Parsing -------------

/// Parses a specimen citation into its entries.
///
/// Fails with [`TypelinkError::Parse`] when the text does not follow the
/// grammar; the error carries the position where matching stopped.
pub fn parse(text: &str) -> Result<Vec<AnySpecimen>> {
    let mut pairs = SpecimenParser::parse(Rule::specimens, text).map_err(|e| {
        let (line, col) = match e.line_col {
            LineColLocation::Pos((line, col)) => (line, col),
            LineColLocation::Span((line, col), _) => (line, col),
        };
        TypelinkError::Parse {
            message: format!("'{}' is not a specimen citation: {}", text, e.variant.message()),
            line: Some(line),
            col: Some(col),
        }
    })?;
    let specimens = pairs
        .next()
        .ok_or_else(|| TypelinkError::Invariant("empty parse of specimen citation".into()))?;
    specimens
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::entry)
        .map(build_entry)
        .collect()
}

/// Prints entries in canonical form, the inverse of [`parse`].
pub fn stringify(specimens: &[AnySpecimen]) -> String {
    specimens
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether any specimen in the citation is, or cross-references, `identifier`.
pub fn contains_identifier(specimens: &[AnySpecimen], identifier: &str) -> bool {
    specimens
        .iter()
        .flat_map(|s| s.specimens())
        .flat_map(|s| s.identifiers())
        .any(|i| i.to_string() == identifier)
}

fn build_entry(pair: Pair<Rule>) -> Result<AnySpecimen> {
    let mut specimens = pair
        .into_inner()
        .map(build_specimen)
        .collect::<Result<Vec<_>>>()?;
    match specimens.len() {
        1 => Ok(AnySpecimen::Specimen(specimens.remove(0))),
        2 => {
            let end = specimens.remove(1);
            let start = specimens.remove(0);
            Ok(AnySpecimen::Range(SpecimenRange { start, end }))
        }
        n => Err(TypelinkError::Invariant(format!("entry with {n} specimens"))),
    }
}

fn build_specimen(pair: Pair<Rule>) -> Result<Specimen> {
    let mut inner = pair.into_inner();
    let base = match inner.next() {
        Some(identifier) => build_identifier(identifier)?,
        None => return Err(TypelinkError::Invariant("specimen without identifier".into())),
    };
    let mut specimen = Specimen::new(base);
    for part in inner {
        match part.as_rule() {
            Rule::comment => specimen.comment = Some(next_text(&mut part.into_inner(), "remark")?),
            Rule::former => specimen.former.push(build_reference(part)?),
            Rule::future => specimen.future.push(build_reference(part)?),
            Rule::extra => specimen.extra.push(build_reference(part)?),
            rule => {
                return Err(TypelinkError::Invariant(format!("unexpected {rule:?} in specimen")));
            }
        }
    }
    Ok(specimen)
}

fn build_reference(pair: Pair<Rule>) -> Result<SpecimenIdentifier> {
    match pair.into_inner().next() {
        Some(identifier) => build_identifier(identifier),
        None => Err(TypelinkError::Invariant("empty cross-reference".into())),
    }
}

fn build_identifier(pair: Pair<Rule>) -> Result<SpecimenIdentifier> {
    match pair.as_rule() {
        Rule::simple => Ok(SpecimenIdentifier::Simple(pair.as_str().to_string())),
        Rule::special => {
            let mut inner = pair.into_inner();
            Ok(SpecimenIdentifier::Special {
                institution: next_text(&mut inner, "institution")?,
                qualifier: next_text(&mut inner, "qualifier")?,
            })
        }
        Rule::triplet => {
            let mut inner = pair.into_inner();
            Ok(SpecimenIdentifier::Triplet {
                institution: next_text(&mut inner, "institution")?,
                department: next_text(&mut inner, "department")?,
                number: next_text(&mut inner, "number")?,
            })
        }
        rule => Err(TypelinkError::Invariant(format!("{rule:?} is not an identifier"))),
    }
}

fn next_text(pairs: &mut Pairs<Rule>, what: &str) -> Result<String> {
    pairs
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| TypelinkError::Invariant(format!("missing {what}")))
}
