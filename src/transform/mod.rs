// ==========================================
// Coffee ETL - transformer
// ==========================================

pub mod columns;
pub mod mapper;

pub use columns::{entity_columns, ColumnSpec, ColumnValue, SqlType, EXTRACT_TIME_COLUMN};
pub use mapper::{transform_row, TransformedRow, EXTRACT_TIME_FORMAT};
