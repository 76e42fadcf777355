// ==========================================
// Coffee ETL - core library
// ==========================================
// Flat files + relational source -> durable queues -> raw
// capture -> quality engine -> transform -> per-run staging DB
// ==========================================

// violation messages (locales/*.yml)
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// Modules
// ==========================================

// domain types, records, transport messages
pub mod domain;

// source adapters (flat files, relational tables)
pub mod source;

// durable queues, producer, raw-capture drain, settle barrier
pub mod broker;

// rule registry, per-run context, quality engine
pub mod quality;

// validated record -> destination columns
pub mod transform;

// destination database and staging tables
pub mod loader;

// raw / clean / error artifacts (staged mode)
pub mod zone;

// orchestrator, run state, run log
pub mod engine;

// settings and overrides
pub mod config;

// connection setup shared by every SQLite handle
pub mod db;

// fixed-delay connectivity retry
pub mod retry;

pub mod logging;
pub mod i18n;
pub mod perf;

// ==========================================
// Re-exports
// ==========================================

pub use config::{EtlSettings, PipelineMode};
pub use domain::{DatasetKey, EntityKind, Message, Provenance, Record, RecordShape};
pub use engine::{Orchestrator, PipelineError, PipelineResult, RunState, RunStatus};
pub use quality::{ForeignKeyMode, QualityEngine, ReferenceSets, RuleOutcome, RuleRegistry};

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Coffee ETL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
