//! Recovers a (name, authority, year) triple from the free-text taxon field
//! of an export row, e.g. `Mus musculus Linnaeus, 1758` or
//! `Peromyscus maniculatus gambelii (Baird, 1858)`.
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use crate::error::{Result, TypelinkError};

lazy_static! {
    // A lazy trinomial lets an authority starting with a particle ("de Winton")
    // win over a third epithet.
    static ref CANDIDATE: Regex = Regex::new(
        r"^(?P<name>[A-Z][a-z]+(?: \([A-Z][a-z]+\))?(?: [a-z][a-z-]+){1,2}?) \(?(?P<authority>(?:(?:de|du|da|del|della|van|von|der|den|le|la|d')\s?)*\p{Lu}[^,()]*?),? (?P<year>\d{4})\)?$"
    ).expect("candidate pattern compiles");
    static ref SUBGENUS: Regex = Regex::new(r" \([A-Z][a-z]+\)").expect("subgenus pattern compiles");
    static ref SPACES: Regex = Regex::new(r"\s+").expect("whitespace pattern compiles");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateName {
    scientific_name: String,
    authority: String,
    year: i32,
}

impl CandidateName {
    pub fn new(scientific_name: &str, authority: &str, year: i32) -> Self {
        Self {
            scientific_name: scientific_name.to_string(),
            authority: authority.to_string(),
            year,
        }
    }
    pub fn scientific_name(&self) -> &str {
        &self.scientific_name
    }
    pub fn authority(&self) -> &str {
        &self.authority
    }
    pub fn year(&self) -> i32 {
        self.year
    }
}

impl fmt::Display for CandidateName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}, {}", self.scientific_name, self.authority, self.year)
    }
}

/// Extracts a candidate name, or fails with [`TypelinkError::Extraction`].
pub fn extract(text: &str) -> Result<CandidateName> {
    let collapsed = SPACES.replace_all(text.trim(), " ");
    let failure = || TypelinkError::Extraction { text: text.to_string() };
    let captures = CANDIDATE.captures(&collapsed).ok_or_else(failure)?;
    let name = SUBGENUS.replace(&captures["name"], "");
    let authority = captures["authority"].trim();
    let year = captures["year"].parse::<i32>().map_err(|_| failure())?;
    Ok(CandidateName::new(&name, authority, year))
}

/// Authorities compare case-insensitively, ignoring spacing.
pub fn authorities_match(left: &str, right: &str) -> bool {
    normalize_authority(left) == normalize_authority(right)
}

fn normalize_authority(authority: &str) -> String {
    SPACES
        .replace_all(authority.trim(), " ")
        .to_lowercase()
}
