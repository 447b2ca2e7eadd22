use core::hash::BuildHasherDefault;
use std::fmt;
use std::str::FromStr;

use seahash::SeaHasher;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypelinkError};

// ------------- Identity -------------
pub type RecordId = i64;

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Nomenclature status -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NomenclatureStatus {
    Available,
    Preoccupied,
    NomenOblitum,
    PartiallySuppressed,
    ConditionallyAvailable,
    NomenNudum,
    IncorrectSubsequentSpelling,
    JustifiedEmendation,
    UnjustifiedEmendation,
    FullySuppressed,
    VarietyOrForm,
    Unpublished,
}

impl NomenclatureStatus {
    pub const ALL: [NomenclatureStatus; 12] = [
        Self::Available,
        Self::Preoccupied,
        Self::NomenOblitum,
        Self::PartiallySuppressed,
        Self::ConditionallyAvailable,
        Self::NomenNudum,
        Self::IncorrectSubsequentSpelling,
        Self::JustifiedEmendation,
        Self::UnjustifiedEmendation,
        Self::FullySuppressed,
        Self::VarietyOrForm,
        Self::Unpublished,
    ];
    /// Names with these statuses carry their own type and may receive type data.
    pub fn requires_type(self) -> bool {
        matches!(
            self,
            Self::Available
                | Self::Preoccupied
                | Self::NomenOblitum
                | Self::PartiallySuppressed
                | Self::ConditionallyAvailable
        )
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Preoccupied => "preoccupied",
            Self::NomenOblitum => "nomen_oblitum",
            Self::PartiallySuppressed => "partially_suppressed",
            Self::ConditionallyAvailable => "conditionally_available",
            Self::NomenNudum => "nomen_nudum",
            Self::IncorrectSubsequentSpelling => "incorrect_subsequent_spelling",
            Self::JustifiedEmendation => "justified_emendation",
            Self::UnjustifiedEmendation => "unjustified_emendation",
            Self::FullySuppressed => "fully_suppressed",
            Self::VarietyOrForm => "variety_or_form",
            Self::Unpublished => "unpublished",
        }
    }
}

impl fmt::Display for NomenclatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NomenclatureStatus {
    type Err = TypelinkError;
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TypelinkError::Persistence(format!("unknown nomenclature status '{s}'")))
    }
}

// ------------- Species type kind -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesTypeKind {
    Holotype,
    Lectotype,
    Neotype,
    Syntypes,
}

impl SpeciesTypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Holotype => "holotype",
            Self::Lectotype => "lectotype",
            Self::Neotype => "neotype",
            Self::Syntypes => "syntypes",
        }
    }
}

impl fmt::Display for SpeciesTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SpeciesTypeKind {
    type Err = TypelinkError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "holotype" => Ok(Self::Holotype),
            "lectotype" => Ok(Self::Lectotype),
            "neotype" => Ok(Self::Neotype),
            "syntypes" => Ok(Self::Syntypes),
            _ => Err(TypelinkError::Persistence(format!("unknown species type kind '{s}'"))),
        }
    }
}

// ------------- Reference -------------
// Singleton objects a run points at: the citation of the source and the
// collection housing its specimens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Citation,
    Collection,
}

impl ReferenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Citation => "citation",
            Self::Collection => "collection",
        }
    }
}

impl FromStr for ReferenceKind {
    type Err = TypelinkError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "citation" => Ok(Self::Citation),
            "collection" => Ok(Self::Collection),
            _ => Err(TypelinkError::Persistence(format!("unknown reference kind '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    id: RecordId,
    kind: ReferenceKind,
    label: String,
}

impl Reference {
    pub fn new(id: RecordId, kind: ReferenceKind, label: String) -> Self {
        Self { id, kind, label }
    }
    pub fn id(&self) -> RecordId {
        self.id
    }
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} #{} ({})", self.kind.as_str(), self.id, self.label)
    }
}

// ------------- Tag -------------
// Tags compare by value; a record never holds two equal tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Tag {
    LocationDetail { text: String, source: RecordId },
    SpecimenDetail { text: String, source: RecordId },
    TypeSpecimenLink { url: String },
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LocationDetail { text, source } => write!(f, "LocationDetail({text:?}, source #{source})"),
            Self::SpecimenDetail { text, source } => write!(f, "SpecimenDetail({text:?}, source #{source})"),
            Self::TypeSpecimenLink { url } => write!(f, "TypeSpecimenLink({url})"),
        }
    }
}

// ------------- Name -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub(crate) id: RecordId,
    pub(crate) corrected_original_name: String,
    pub(crate) authority: Option<String>,
    pub(crate) year: Option<i32>,
    pub(crate) nomenclature_status: NomenclatureStatus,
    pub(crate) type_specimen: Option<String>,
    pub(crate) collection: Option<Reference>,
    pub(crate) species_type_kind: Option<SpeciesTypeKind>,
    pub(crate) tags: Vec<Tag>,
}

impl NameRecord {
    pub fn id(&self) -> RecordId {
        self.id
    }
    pub fn corrected_original_name(&self) -> &str {
        &self.corrected_original_name
    }
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }
    pub fn year(&self) -> Option<i32> {
        self.year
    }
    pub fn nomenclature_status(&self) -> NomenclatureStatus {
        self.nomenclature_status
    }
    /// The current type specimen text; blank text counts as absent.
    pub fn type_specimen(&self) -> Option<&str> {
        self.type_specimen.as_deref().filter(|t| !t.trim().is_empty())
    }
    pub fn collection(&self) -> Option<&Reference> {
        self.collection.as_ref()
    }
    pub fn species_type_kind(&self) -> Option<SpeciesTypeKind> {
        self.species_type_kind
    }
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }
}

impl fmt::Display for NameRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.corrected_original_name)?;
        if let Some(authority) = &self.authority {
            write!(f, " {authority}")?;
        }
        if let Some(year) = self.year {
            write!(f, ", {year}")?;
        }
        write!(f, " [{}]", self.nomenclature_status)?;
        if let Some(type_specimen) = self.type_specimen() {
            write!(f, " type: {type_specimen}")?;
        }
        Ok(())
    }
}

/// Fields a name can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    CorrectedOriginalName,
    Authority,
    TypeSpecimen,
}

impl NameField {
    pub fn column(self) -> &'static str {
        match self {
            Self::CorrectedOriginalName => "CorrectedOriginalName",
            Self::Authority => "Authority",
            Self::TypeSpecimen => "TypeSpecimen",
        }
    }
}

// ------------- Corpus -------------
/// The store of names being enriched.
///
/// Every setter commits immediately. Callers are responsible for the
/// "fill, don't overwrite" discipline; the store does what it is told.
pub trait Corpus {
    fn lookup_by_exact_field(&self, field: NameField, value: &str) -> Result<Vec<NameRecord>>;
    fn name(&self, id: RecordId) -> Result<Option<NameRecord>>;
    fn get_or_create_singleton_by_label(&self, kind: ReferenceKind, label: &str) -> Result<Reference>;
    /// Adds `tag` unless an equal tag is already present; returns whether it was added.
    fn add_tag(&self, id: RecordId, tag: &Tag) -> Result<bool>;
    fn set_type_specimen(&self, id: RecordId, type_specimen: &str) -> Result<()>;
    fn set_collection(&self, id: RecordId, collection: &Reference) -> Result<()>;
    fn set_species_type_kind(&self, id: RecordId, kind: SpeciesTypeKind) -> Result<()>;
    fn set_nomenclature_status(&self, id: RecordId, status: NomenclatureStatus) -> Result<()>;
}
