//! Per-collection adapters.
//!
//! Each collection exports its own columns. An adapter reads a row into the
//! collection's typed row and hands the matching engine the few things it
//! needs: the catalog identifier, the taxon text, the type status, the tags
//! to attach, and the rule for when an existing type specimen may be
//! replaced by the one in the export.
use lazy_static::lazy_static;
use regex::Regex;

use crate::candidate::{self, CandidateName};
use crate::corpus::{RecordId, SpeciesTypeKind, Tag};
use crate::engine::RunContext;
use crate::error::Result;
use crate::export::ExternalRow;

pub mod mvz;
pub mod nhmuk;
pub mod usnm;

pub use mvz::Mvz;
pub use nhmuk::Nhmuk;
pub use usnm::Usnm;

lazy_static! {
    static ref BRACKETED_SUFFIX: Regex = Regex::new(r"\s*(?:\[[^\]]*\]|\([^)]*\))$").expect("bracket pattern compiles");
    static ref PART_SUFFIX: Regex = Regex::new(
        r"(?i)(?:\s*-\s*|\s+)(?:skin|skull|skel|skeleton|body|alc|alcohol|fluid|tissue|partial|mandible|head)$"
    ).expect("part pattern compiles");
    static ref LEADING_ZEROS: Regex = Regex::new(r"^([A-Za-z]*)0+(\d)").expect("padding pattern compiles");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("whitespace pattern compiles");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeStatus {
    Type(SpeciesTypeKind),
    NotAType,
}

impl TypeStatus {
    /// Reads the leading word of a type-status cell ("Holotype", "syntype of ...").
    pub fn from_text(text: &str) -> Self {
        let word = text
            .trim()
            .split(|c: char| !c.is_alphabetic())
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match word.as_str() {
            "holotype" => Self::Type(SpeciesTypeKind::Holotype),
            "lectotype" => Self::Type(SpeciesTypeKind::Lectotype),
            "neotype" => Self::Type(SpeciesTypeKind::Neotype),
            "syntype" | "syntypes" | "cotype" | "cotypes" => Self::Type(SpeciesTypeKind::Syntypes),
            _ => Self::NotAType,
        }
    }
}

pub trait SourceAdapter {
    fn name(&self) -> &'static str;
    /// The row's catalog identifier in citation form, e.g. `BMNH 1900.1.1.1`.
    fn identifier(&self, row: &ExternalRow) -> Option<String>;
    fn taxon_text(&self, row: &ExternalRow) -> Option<String>;
    fn type_status(&self, row: &ExternalRow) -> TypeStatus;
    fn tags(&self, row: &ExternalRow, context: &RunContext) -> Vec<Tag>;
    /// Whether `existing` type specimen text may give way to `new`.
    fn can_replace(&self, existing: &str, new: &str) -> bool;
    fn supports_type_series(&self) -> bool {
        false
    }
    fn candidate(&self, row: &ExternalRow) -> Result<CandidateName> {
        candidate::extract(&self.taxon_text(row).unwrap_or_default())
    }
    /// Rows are reviewed grouped by type status, then by name.
    fn sort_key(&self, row: &ExternalRow) -> (TypeStatus, String) {
        (self.type_status(row), self.taxon_text(row).unwrap_or_default())
    }
}

pub fn adapter_for(name: &str) -> Option<Box<dyn SourceAdapter>> {
    match name.trim().to_lowercase().as_str() {
        "nhmuk" | "bmnh" => Some(Box::new(Nhmuk)),
        "mvz" => Some(Box::new(Mvz)),
        "usnm" => Some(Box::new(Usnm)),
        _ => None,
    }
}

/// Derives the natural key of a catalog number: institution prefixes,
/// bracketed qualifiers and specimen-part suffixes are removed and leading
/// zero padding is dropped.
///
/// ```
/// use typelink::source::normalize_catalog_number;
/// assert_eq!(normalize_catalog_number("NHMUK 0042 [skull]", &["NHMUK"]).as_deref(), Some("42"));
/// ```
pub fn normalize_catalog_number(raw: &str, prefixes: &[&str]) -> Option<String> {
    let mut number = SPACES.replace_all(raw.trim(), " ").to_string();
    for prefix in prefixes {
        let matched = number
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matched {
            number = number[prefix.len()..]
                .trim_start_matches([' ', ':', '-'])
                .to_string();
            break;
        }
    }
    loop {
        let stripped = PART_SUFFIX.replace(&BRACKETED_SUFFIX.replace(&number, ""), "").to_string();
        if stripped == number {
            break;
        }
        number = stripped;
    }
    let number = LEADING_ZEROS.replace(number.trim(), "$1$2").to_string();
    if number.is_empty() { None } else { Some(number) }
}

/// Location and specimen details attributed to the run's citation, plus a link.
pub(crate) fn detail_tags(location: &[Option<&str>], specimen: Option<&str>, link: Option<String>, source: RecordId) -> Vec<Tag> {
    let mut tags = Vec::new();
    let location = location.iter().flatten().copied().collect::<Vec<_>>().join(", ");
    if !location.is_empty() {
        tags.push(Tag::LocationDetail { text: location, source });
    }
    if let Some(text) = specimen {
        tags.push(Tag::SpecimenDetail { text: text.to_string(), source });
    }
    if let Some(url) = link {
        tags.push(Tag::TypeSpecimenLink { url });
    }
    tags
}

/// Existing type text that lists or hedges between specimens.
pub(crate) fn has_list_punctuation(text: &str) -> bool {
    [",", ";", "/", "(", " or ", " and ", "?"].iter().any(|p| text.contains(p))
}
