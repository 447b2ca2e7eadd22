//! Decides whether a matched name may take the exported type specimen, and how.
use std::fmt;

use tracing::debug;

use crate::corpus::{NameRecord, NomenclatureStatus, Reference, SpeciesTypeKind};
use crate::source::SourceAdapter;
use crate::specimen;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(NomenclatureStatus),
}

pub fn eligibility(record: &NameRecord) -> Eligibility {
    let status = record.nomenclature_status();
    if status.requires_type() {
        Eligibility::Eligible
    } else {
        Eligibility::Ineligible(status)
    }
}

/// What happens to the name's type specimen text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeUpdate {
    /// The name had no type specimen.
    Fill(String),
    /// The existing text is a less precise form of the new identifier.
    Replace(String),
    /// The identifier joins an existing type series.
    Append(String),
    /// The existing text already cites the identifier.
    Keep,
}

impl TypeUpdate {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Fill(text) | Self::Replace(text) | Self::Append(text) => Some(text),
            Self::Keep => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub existing_type: Option<String>,
    pub existing_collection: Option<Reference>,
    /// The existing type text could not be read as a specimen citation.
    pub unparseable: bool,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.existing_type, &self.existing_collection) {
            (_, Some(collection)) => write!(f, "name is in {collection}"),
            (Some(existing), None) if self.unparseable => write!(f, "unreadable type specimen {existing:?}"),
            (Some(existing), None) => write!(f, "type specimen is already {existing:?}"),
            (None, None) => write!(f, "conflict"),
        }
    }
}

/// Plans the type specimen update for `identifier` under "fill, don't overwrite":
/// existing text is only replaced when the source's `can_replace` allows it.
pub fn plan_type_update(
    record: &NameRecord,
    identifier: &str,
    kind: SpeciesTypeKind,
    adapter: &dyn SourceAdapter,
    collection: &Reference,
) -> Result<TypeUpdate, Conflict> {
    let existing_type = record.type_specimen().map(clean_citation);
    if let Some(existing) = record.collection() {
        if existing.id() != collection.id() {
            return Err(Conflict {
                existing_type: existing_type.map(str::to_string),
                existing_collection: Some(existing.clone()),
                unparseable: false,
            });
        }
    }
    let Some(existing) = existing_type else {
        return Ok(TypeUpdate::Fill(identifier.to_string()));
    };
    if existing == identifier {
        return Ok(TypeUpdate::Keep);
    }
    let conflict = |unparseable| Conflict {
        existing_type: Some(existing.to_string()),
        existing_collection: None,
        unparseable,
    };
    let series = match specimen::parse(existing) {
        Ok(series) => series,
        Err(e) => {
            debug!(record = record.id(), error = %e, "existing type specimen does not parse");
            return Err(conflict(true));
        }
    };
    if specimen::contains_identifier(&series, identifier) {
        return Ok(TypeUpdate::Keep);
    }
    // A series only grows when the name is not known to have a single type.
    let open_series = matches!(record.species_type_kind(), None | Some(SpeciesTypeKind::Syntypes));
    if adapter.supports_type_series() && kind == SpeciesTypeKind::Syntypes && open_series {
        if let Ok(addition) = specimen::parse(identifier) {
            let mut series = series;
            series.extend(addition);
            return Ok(TypeUpdate::Append(specimen::stringify(&series)));
        }
    }
    if adapter.can_replace(existing, identifier) {
        return Ok(TypeUpdate::Replace(identifier.to_string()));
    }
    Err(conflict(false))
}

// Trailing punctuation is not part of a citation.
fn clean_citation(text: &str) -> &str {
    text.trim().trim_end_matches(['.', ';', ',']).trim_end()
}
