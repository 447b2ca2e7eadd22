//! Museum of Vertebrate Zoology, Berkeley: Arctos export.
//!
//! Arctos identifies specimens by GUIDs such as `MVZ:Mamm:12345` and puts the
//! name the specimen is a type of into the type status itself
//! (`holotype of Thomomys bottae mewa Thaeler, 1968`).
use lazy_static::lazy_static;
use regex::Regex;

use crate::corpus::Tag;
use crate::engine::RunContext;
use crate::export::ExternalRow;
use crate::specimen::{self, AnySpecimen, SpecimenIdentifier};

use super::{SourceAdapter, TypeStatus, detail_tags, normalize_catalog_number};

const PREFIXES: [&str; 1] = ["MVZ"];

lazy_static! {
    static ref NUMBER_SUFFIX: Regex = Regex::new(r"^(\d+)[A-Za-z.]*$").expect("suffix pattern compiles");
}

struct MvzRow<'r> {
    guid: Option<&'r str>,
    cat_num: Option<&'r str>,
    type_status: Option<&'r str>,
    scientific_name: Option<&'r str>,
    spec_locality: Option<&'r str>,
    state_prov: Option<&'r str>,
    country: Option<&'r str>,
    parts: Option<&'r str>,
}

impl<'r> MvzRow<'r> {
    fn from_row(row: &'r ExternalRow) -> Self {
        Self {
            guid: row.get("guid"),
            cat_num: row.get("cat_num"),
            type_status: row.get("typestatus"),
            scientific_name: row.get("scientific_name"),
            spec_locality: row.get("spec_locality"),
            state_prov: row.get("state_prov"),
            country: row.get("country"),
            parts: row.get("parts"),
        }
    }
    // The catalog number from the GUID triplet, falling back to cat_num.
    fn catalog_number(&self) -> Option<&'r str> {
        let from_guid = self.guid.and_then(|guid| match specimen::parse(guid).ok()?.as_slice() {
            [AnySpecimen::Specimen(s)] => match &s.base {
                SpecimenIdentifier::Triplet { institution, .. } if institution == "MVZ" => {
                    guid.rsplit(':').next()
                }
                _ => None,
            },
            _ => None,
        });
        from_guid.or(self.cat_num)
    }
}

pub struct Mvz;

impl SourceAdapter for Mvz {
    fn name(&self) -> &'static str {
        "mvz"
    }
    fn identifier(&self, row: &ExternalRow) -> Option<String> {
        let number = normalize_catalog_number(MvzRow::from_row(row).catalog_number()?, &PREFIXES)?;
        Some(format!("MVZ {number}"))
    }
    fn taxon_text(&self, row: &ExternalRow) -> Option<String> {
        let row = MvzRow::from_row(row);
        row.type_status
            .and_then(|status| status.split_once(" of "))
            .map(|(_, taxon)| taxon.trim().to_string())
            .or_else(|| row.scientific_name.map(str::to_string))
    }
    fn type_status(&self, row: &ExternalRow) -> TypeStatus {
        TypeStatus::from_text(MvzRow::from_row(row).type_status.unwrap_or_default())
    }
    fn tags(&self, row: &ExternalRow, context: &RunContext) -> Vec<Tag> {
        let row = MvzRow::from_row(row);
        let link = row
            .guid
            .map(|guid| format!("https://arctos.database.museum/guid/{guid}"));
        detail_tags(
            &[row.spec_locality, row.state_prov, row.country],
            row.parts,
            link,
            context.citation().id(),
        )
    }
    /// A lone MVZ specimen whose number only differs from the new one by a
    /// letter or part suffix (`MVZ 12345a`, `MVZ 12345 skull`).
    fn can_replace(&self, existing: &str, new: &str) -> bool {
        let Ok(specimens) = specimen::parse(existing) else {
            return false;
        };
        let [AnySpecimen::Specimen(lone)] = specimens.as_slice() else {
            return false;
        };
        if lone.base.institution() != "MVZ" {
            return false;
        }
        let stem = |number: &str| {
            normalize_catalog_number(number, &PREFIXES).and_then(|n| {
                NUMBER_SUFFIX
                    .captures(&n)
                    .map(|c| c[1].to_string())
            })
        };
        match (lone.base.catalog_number().and_then(stem), stem(new)) {
            (Some(old), Some(new)) => old == new,
            _ => false,
        }
    }
}
