//! Rows of a collection's tabular export.
use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::corpus::OtherHasher;
use crate::error::{Result, TypelinkError};

/// One export row, column name to cell text. Never mutated after loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalRow {
    cells: HashMap<String, String, OtherHasher>,
}

impl ExternalRow {
    pub fn new<K: Into<String>, V: Into<String>>(cells: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            cells: cells.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
    /// The trimmed cell, or `None` when the column is missing or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Loads every row of a delimited export with a header line.
pub fn load_rows(path: impl AsRef<Path>, delimiter: u8) -> Result<Vec<ExternalRow>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| TypelinkError::Export(format!("cannot open {}: {}", path.display(), e)))?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ExternalRow::new(
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.to_string(), cell.to_string())),
        ));
    }
    info!(path = %path.display(), rows = rows.len(), "export loaded");
    Ok(rows)
}
