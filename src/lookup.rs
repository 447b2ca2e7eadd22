//! Finds the corpus name a candidate refers to.
use crate::candidate::{CandidateName, authorities_match};
use crate::corpus::{Corpus, NameField, NameRecord};
use crate::error::Result;

/// Years may be off by this much; exports often cite the year of the volume.
pub const YEAR_TOLERANCE: i32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult {
    Unique(NameRecord),
    Ambiguous(Vec<NameRecord>),
    /// Nothing survived; `near_misses` share the name but not authority and year.
    Empty { near_misses: Vec<NameRecord> },
}

pub fn find_name<C: Corpus + ?Sized>(corpus: &C, candidate: &CandidateName) -> Result<LookupResult> {
    let named = corpus.lookup_by_exact_field(NameField::CorrectedOriginalName, candidate.scientific_name())?;
    let (mut survivors, near_misses): (Vec<_>, Vec<_>) = named
        .into_iter()
        .partition(|record| matches_candidate(record, candidate));
    Ok(match survivors.len() {
        0 => LookupResult::Empty { near_misses },
        1 => LookupResult::Unique(survivors.remove(0)),
        _ => LookupResult::Ambiguous(survivors),
    })
}

pub fn matches_candidate(record: &NameRecord, candidate: &CandidateName) -> bool {
    let authority = record
        .authority()
        .is_some_and(|authority| authorities_match(authority, candidate.authority()));
    let year = record
        .year()
        .is_some_and(|year| (year - candidate.year()).abs() <= YEAR_TOLERANCE);
    authority && year
}
