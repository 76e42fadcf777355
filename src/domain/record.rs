// ==========================================
// Coffee ETL - records and transport messages
// ==========================================

use crate::domain::types::{EntityKind, Provenance};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field map as read from a source: every value in text form.
pub type Record = BTreeMap<String, String>;

const BOM: char = '\u{feff}';

/// Strip a UTF-8 byte-order mark and surrounding whitespace.
pub fn clean_token(s: &str) -> String {
    s.trim().trim_start_matches(BOM).trim().to_string()
}

/// Text form of a JSON value; null becomes the empty string.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ==========================================
// MessageMetadata / Message
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub extract_time: NaiveDateTime,
    pub run_id: String,
    /// File name or table name the record was read from.
    pub origin: String,
}

/// Queue message body. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub source: Provenance,
    pub entity_type: String,
    pub data: BTreeMap<String, Value>,
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// Entity kind, when the wire name is one the pipeline knows.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.entity_type.parse().ok()
    }

    /// Field map in text form with cleaned keys.
    pub fn record(&self) -> Record {
        self.data
            .iter()
            .map(|(k, v)| (clean_token(k), value_to_text(v)))
            .collect()
    }
}

// ==========================================
// CapturedRecord
// ==========================================
// A message after raw capture, numbered in drain order.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRecord {
    pub row_number: usize,
    pub fields: Record,
    pub metadata: MessageMetadata,
}
