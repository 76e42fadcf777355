// ==========================================
// Coffee ETL - source adapter errors
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported source file format: {0} (only .csv)")]
    UnsupportedFormat(String),

    #[error("CSV parse failed: {0}")]
    CsvParse(String),

    #[error("source database error: {0}")]
    Database(String),

    #[error("invalid identifier for schema/table: {0}")]
    InvalidIdentifier(String),

    #[error("source connection lock failed: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        SourceError::CsvParse(err.to_string())
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Database(err.to_string())
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
