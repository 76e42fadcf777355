// ==========================================
// Coffee ETL - domain layer
// ==========================================

pub mod record;
pub mod types;

pub use record::{clean_token, value_to_text, CapturedRecord, Message, MessageMetadata, Record};
pub use types::{queue_name_for, DatasetKey, EntityKind, Provenance, RecordShape};
