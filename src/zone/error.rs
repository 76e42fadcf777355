// ==========================================
// Coffee ETL - zone artifact errors
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("zone I/O failed: {0}")]
    Io(String),

    #[error("zone CSV failed: {0}")]
    Csv(String),

    #[error("malformed zone file {path}: {message}")]
    Malformed { path: String, message: String },
}

impl From<std::io::Error> for ZoneError {
    fn from(e: std::io::Error) -> Self {
        ZoneError::Io(e.to_string())
    }
}

impl From<csv::Error> for ZoneError {
    fn from(e: csv::Error) -> Self {
        ZoneError::Csv(e.to_string())
    }
}

pub type ZoneResult<T> = Result<T, ZoneError>;
