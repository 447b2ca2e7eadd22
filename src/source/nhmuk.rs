//! Natural History Museum, London: specimen export from the data portal.
use crate::corpus::Tag;
use crate::engine::RunContext;
use crate::export::ExternalRow;

use super::{SourceAdapter, TypeStatus, detail_tags, has_list_punctuation, normalize_catalog_number};

const PREFIXES: [&str; 2] = ["NHMUK", "BMNH"];

struct NhmukRow<'r> {
    catalog_number: Option<&'r str>,
    type_status: Option<&'r str>,
    scientific_name: Option<&'r str>,
    locality: Option<&'r str>,
    country: Option<&'r str>,
    preparations: Option<&'r str>,
    occurrence_id: Option<&'r str>,
}

impl<'r> NhmukRow<'r> {
    fn from_row(row: &'r ExternalRow) -> Self {
        Self {
            catalog_number: row.get("catalogNumber"),
            type_status: row.get("typeStatus"),
            scientific_name: row.get("scientificName"),
            locality: row.get("locality"),
            country: row.get("country"),
            preparations: row.get("preparations"),
            occurrence_id: row.get("occurrenceID"),
        }
    }
}

pub struct Nhmuk;

impl SourceAdapter for Nhmuk {
    fn name(&self) -> &'static str {
        "nhmuk"
    }
    fn identifier(&self, row: &ExternalRow) -> Option<String> {
        let number = normalize_catalog_number(NhmukRow::from_row(row).catalog_number?, &PREFIXES)?;
        Some(format!("BMNH {number}"))
    }
    fn taxon_text(&self, row: &ExternalRow) -> Option<String> {
        NhmukRow::from_row(row).scientific_name.map(str::to_string)
    }
    fn type_status(&self, row: &ExternalRow) -> TypeStatus {
        TypeStatus::from_text(NhmukRow::from_row(row).type_status.unwrap_or_default())
    }
    fn tags(&self, row: &ExternalRow, context: &RunContext) -> Vec<Tag> {
        let row = NhmukRow::from_row(row);
        let link = row
            .occurrence_id
            .map(|id| format!("https://data.nhm.ac.uk/object/{id}"));
        detail_tags(&[row.locality, row.country], row.preparations, link, context.citation().id())
    }
    /// The old number must occur in the new identifier as whole dot-separated
    /// parts (`1900.1.1` in `BMNH 1900.1.1.1`, but not `42` in `BMNH 1942`),
    /// and the old text must not be a list of specimens or a hedge between
    /// alternatives.
    fn can_replace(&self, existing: &str, new: &str) -> bool {
        if has_list_punctuation(existing) {
            return false;
        }
        normalize_catalog_number(existing, &PREFIXES).is_some_and(|bare| contains_at_boundary(new, &bare))
    }
}

fn contains_at_boundary(text: &str, part: &str) -> bool {
    let boundary = |c: Option<char>| c.is_none_or(|c| c == ' ' || c == '.');
    text.match_indices(part).any(|(start, _)| {
        boundary(text[..start].chars().next_back()) && boundary(text[start + part.len()..].chars().next())
    })
}
