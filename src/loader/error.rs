// ==========================================
// Coffee ETL - loader errors
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot open destination database: {0}")]
    Connection(String),

    #[error("destination database already exists: {0}")]
    DatabaseExists(String),

    #[error("destination statement failed: {0}")]
    Storage(String),

    #[error("destination lock poisoned: {0}")]
    Lock(String),

    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error("row has {actual} values, table {table} expects {expected}")]
    ColumnMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
}

impl From<rusqlite::Error> for LoadError {
    fn from(e: rusqlite::Error) -> Self {
        LoadError::Storage(e.to_string())
    }
}

pub type LoadResult<T> = Result<T, LoadError>;
