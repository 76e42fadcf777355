// ==========================================
// Coffee ETL - loader
// ==========================================
// Destination database per run, staging DDL, batched inserts.
// ==========================================

pub mod ddl;
pub mod destination;
pub mod error;
pub mod staging_loader;

pub use destination::{database_name, database_path, Destination, QueryRow, SqliteDestination};
pub use error::{LoadError, LoadResult};
pub use staging_loader::{LoadReport, StagingLoader, DEFAULT_BATCH_SIZE};
