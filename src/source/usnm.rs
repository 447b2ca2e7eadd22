//! National Museum of Natural History, Smithsonian: collection export.
//!
//! USNM lists syntype series specimen by specimen, so a syntype row extends
//! the citation already on the name instead of conflicting with it.
use crate::corpus::Tag;
use crate::engine::RunContext;
use crate::export::ExternalRow;
use crate::specimen::{self, AnySpecimen};

use super::{SourceAdapter, TypeStatus, detail_tags, normalize_catalog_number};

const PREFIXES: [&str; 1] = ["USNM"];

struct UsnmRow<'r> {
    catalog_number: Option<&'r str>,
    type_status: Option<&'r str>,
    scientific_name: Option<&'r str>,
    authorship: Option<&'r str>,
    locality: Option<&'r str>,
    state_province: Option<&'r str>,
    country: Option<&'r str>,
    preparations: Option<&'r str>,
    occurrence_id: Option<&'r str>,
}

impl<'r> UsnmRow<'r> {
    fn from_row(row: &'r ExternalRow) -> Self {
        Self {
            catalog_number: row.get("catalogNumber"),
            type_status: row.get("typeStatus"),
            scientific_name: row.get("scientificName"),
            authorship: row.get("scientificNameAuthorship"),
            locality: row.get("locality"),
            state_province: row.get("stateProvince"),
            country: row.get("country"),
            preparations: row.get("preparations"),
            occurrence_id: row.get("occurrenceID"),
        }
    }
}

// Old catalog entries carry an "A" prefix that later listings drop.
fn catalog_key(number: &str) -> Option<String> {
    let number = normalize_catalog_number(number, &PREFIXES)?;
    let unprefixed = number.strip_prefix('A').unwrap_or(&number);
    normalize_catalog_number(unprefixed, &[])
}

pub struct Usnm;

impl SourceAdapter for Usnm {
    fn name(&self) -> &'static str {
        "usnm"
    }
    fn identifier(&self, row: &ExternalRow) -> Option<String> {
        let number = normalize_catalog_number(UsnmRow::from_row(row).catalog_number?, &PREFIXES)?;
        Some(format!("USNM {number}"))
    }
    fn taxon_text(&self, row: &ExternalRow) -> Option<String> {
        let row = UsnmRow::from_row(row);
        let name = row.scientific_name?;
        match row.authorship {
            Some(authorship) if !name.contains(authorship) => Some(format!("{name} {authorship}")),
            _ => Some(name.to_string()),
        }
    }
    fn type_status(&self, row: &ExternalRow) -> TypeStatus {
        TypeStatus::from_text(UsnmRow::from_row(row).type_status.unwrap_or_default())
    }
    fn tags(&self, row: &ExternalRow, context: &RunContext) -> Vec<Tag> {
        let row = UsnmRow::from_row(row);
        let link = row
            .occurrence_id
            .filter(|id| id.starts_with("http"))
            .map(str::to_string);
        detail_tags(
            &[row.locality, row.state_province, row.country],
            row.preparations,
            link,
            context.citation().id(),
        )
    }
    fn supports_type_series(&self) -> bool {
        true
    }
    /// A single plain USNM specimen with the same number once padding and the
    /// old "A" prefix are set aside.
    fn can_replace(&self, existing: &str, new: &str) -> bool {
        let Ok(specimens) = specimen::parse(existing) else {
            return false;
        };
        let [AnySpecimen::Specimen(lone)] = specimens.as_slice() else {
            return false;
        };
        if lone.base.institution() != "USNM" || lone.identifiers().count() > 1 {
            return false;
        }
        match (lone.base.catalog_number().and_then(catalog_key), catalog_key(new)) {
            (Some(old), Some(new)) => old == new,
            _ => false,
        }
    }
}
