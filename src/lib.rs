//! # Typelink
//!
//! Links the type specimens listed in museum collection exports to the
//! scientific names they are types of, in a taxonomic name corpus.
//!
//! A run reads one collection's export (NHMUK, MVZ or USNM), and for every
//! row:
//! 1. reads the catalog identifier and checks it against the specimen
//!    citation grammar ([`specimen`]),
//! 2. pulls a (name, authority, year) candidate out of the taxon text
//!    ([`candidate`]) and looks it up in the corpus ([`lookup`]),
//! 3. decides whether the matched name may take the specimen, and how
//!    ([`classify`]),
//! 4. commits the change, or hands the case to an operator when the data
//!    does not settle it ([`engine`], [`operator`]).
//!
//! Existing curated data is never overwritten without a rule that says the
//! new text is a more precise form of the old one, or without a person
//! saying so. Identifiers an operator has set aside are kept in an
//! append-only exclusion memo ([`memo`]) and never shown again.
//!
//! ## Specimen citations
//! ```
//! use typelink::specimen;
//! let citation = "BMNH 1900.1.1.1 (= AMNH 42), MVZ:Mamm:12345, USNM 1 through USNM 5";
//! let parsed = specimen::parse(citation).unwrap();
//! assert_eq!(parsed.len(), 3);
//! assert_eq!(specimen::stringify(&parsed), citation);
//! ```
//!
//! ## Storage
//! The corpus lives in SQLite ([`persist`]). Every mutation is appended to a
//! change ledger whose entries are chained with BLAKE3, so two stores that
//! went through the same changes end with the same superhash.
//!
//! ## Configuration
//! See [`settings::Settings`]; everything can be set in `typelink.toml` or
//! through `TYPELINK_*` environment variables.

pub mod candidate;
pub mod classify;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod export;
pub mod lookup;
pub mod memo;
pub mod operator;
pub mod persist;
pub mod settings;
pub mod source;
pub mod specimen;

pub use error::{Result, TypelinkError};
