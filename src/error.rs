use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypelinkError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Export error: {0}")]
    Export(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Cannot extract a name from '{text}'")]
    Extraction { text: String },
    #[error("Aborted by operator")]
    OperatorAbort,
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, TypelinkError>;

// Helper conversions
impl From<rusqlite::Error> for TypelinkError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<std::io::Error> for TypelinkError {
    fn from(e: std::io::Error) -> Self { Self::Io(e.to_string()) }
}
impl From<config::ConfigError> for TypelinkError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<csv::Error> for TypelinkError {
    fn from(e: csv::Error) -> Self { Self::Export(e.to_string()) }
}
impl From<serde_json::Error> for TypelinkError {
    fn from(e: serde_json::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for TypelinkError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
