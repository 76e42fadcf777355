// ==========================================
// Coffee ETL - source adapters
// ==========================================
// Collaborators the producer reads from: a flat-file row
// reader and a relational table reader/discoverer.
// ==========================================

pub mod csv_reader;
pub mod discovery;
pub mod error;
pub mod relational;

pub use csv_reader::CsvFileSource;
pub use discovery::{dataset_for_table, discover_files, is_system_table, DatasetName};
pub use error::{SourceError, SourceResult};
pub use relational::SqliteSource;

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// One source row before it is wrapped into a message.
pub type SourceRow = BTreeMap<String, Value>;

pub trait FileSource: Send + Sync {
    fn read_rows(&self, path: &Path) -> SourceResult<Vec<SourceRow>>;
}

pub trait RelationalSource: Send + Sync {
    fn list_tables(&self, schema: &str) -> SourceResult<Vec<String>>;

    fn read_table(&self, schema: &str, table: &str) -> SourceResult<Vec<SourceRow>>;
}
