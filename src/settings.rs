//! Run settings: an optional TOML file overlaid by `TYPELINK_*` environment
//! variables, e.g. `TYPELINK_SOURCE=mvz` or `TYPELINK_INTERACTIVE=false`.
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Result, TypelinkError};
use crate::persist::PersistenceMode;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Path of the SQLite file, or `:memory:`.
    pub database: String,
    pub exclusion_memo: PathBuf,
    pub interactive: bool,
    /// One of `nhmuk`, `mvz`, `usnm`.
    pub source: String,
    pub export: PathBuf,
    pub delimiter: String,
    /// Label of the citation the run's tags are attributed to.
    pub citation: String,
    /// Label of the collection housing the exported specimens.
    pub collection: String,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let settings = Config::builder()
            .set_default("database", "typelink.db")?
            .set_default("exclusion_memo", "excluded.txt")?
            .set_default("interactive", true)?
            .set_default("source", "nhmuk")?
            .set_default("export", "export.csv")?
            .set_default("delimiter", ",")?
            .set_default("citation", "collection database export")?
            .set_default("collection", "Natural History Museum, London")?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("TYPELINK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        PersistenceMode::from_setting(&self.database)
    }

    /// The delimiter as a single byte; `\t` and `tab` name a tab.
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_str() {
            "\\t" | "tab" | "\t" => Ok(b'\t'),
            d if d.len() == 1 => Ok(d.as_bytes()[0]),
            d => Err(TypelinkError::Config(format!("delimiter must be one byte, got '{d}'"))),
        }
    }
}
