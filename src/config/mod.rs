// ==========================================
// Coffee ETL - configuration layer
// ==========================================
// Settings with defaults, overridable per key from the
// environment (or a map in tests).
// ==========================================

pub mod config_source;
pub mod error;
pub mod settings;

pub use config_source::{ConfigSource, EnvConfigSource, MapConfigSource};
pub use error::{ConfigError, ConfigResult};
pub use settings::{config_keys, EtlSettings, PipelineMode};
