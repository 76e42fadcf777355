// ==========================================
// Coffee ETL - quality engine
// ==========================================
// Per-shape validators, a shared per-run context and the
// registry/engine that decide whether a row reaches loading.
// ==========================================

pub mod context;
pub mod engine;
pub mod error;
pub mod field_rules;
pub mod patterns;
pub mod references;
pub mod registry;
pub mod rules_config;
pub mod validators;
pub mod violation;

pub use context::ValidationContext;
pub use engine::{QualityEngine, RejectedRecord, ValidRecord, ValidationReport};
pub use error::{QualityError, QualityResult};
pub use patterns::Patterns;
pub use references::{ForeignKeyMode, ReferenceSets};
pub use registry::{RuleRegistry, RuleSeverity};
pub use violation::{RuleOutcome, Violation, ViolationCode};
