// ==========================================
// Coffee ETL - pipeline settings
// ==========================================
// Defaults first, then overrides from a ConfigSource.
// A value that is present but does not parse is an error;
// it never silently falls back to the default.
// ==========================================

use crate::broker::{DrainOptions, SettlePolicy};
use crate::config::config_source::ConfigSource;
use crate::config::error::{ConfigError, ConfigResult};
use crate::quality::ForeignKeyMode;
use crate::retry::RetryPolicy;
use crate::zone::ZoneLayout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment keys
pub mod config_keys {
    // paths
    pub const DATA_DIR: &str = "COFFEE_ETL_DATA_DIR";
    pub const STAGING_ROOT: &str = "COFFEE_ETL_STAGING_ROOT";
    pub const DESTINATION_DIR: &str = "COFFEE_ETL_DESTINATION_DIR";
    pub const BROKER_PATH: &str = "COFFEE_ETL_BROKER_PATH";
    pub const SOURCE_DB_PATH: &str = "COFFEE_ETL_SOURCE_DB";
    pub const SOURCE_SCHEMA: &str = "COFFEE_ETL_SOURCE_SCHEMA";

    // loading
    pub const LOAD_BATCH_SIZE: &str = "COFFEE_ETL_LOAD_BATCH_SIZE";

    // connectivity retry
    pub const RETRY_ATTEMPTS: &str = "COFFEE_ETL_RETRY_ATTEMPTS";
    pub const RETRY_DELAY_MS: &str = "COFFEE_ETL_RETRY_DELAY_MS";

    // producer/consumer barrier
    pub const SETTLE_INITIAL_POLL_MS: &str = "COFFEE_ETL_SETTLE_INITIAL_POLL_MS";
    pub const SETTLE_MAX_POLL_MS: &str = "COFFEE_ETL_SETTLE_MAX_POLL_MS";
    pub const SETTLE_TIMEOUT_MS: &str = "COFFEE_ETL_SETTLE_TIMEOUT_MS";

    // raw capture
    pub const DRAIN_POLL_MS: &str = "COFFEE_ETL_DRAIN_POLL_MS";
    pub const DRAIN_DEADLINE_MS: &str = "COFFEE_ETL_DRAIN_DEADLINE_MS";

    // behaviour
    pub const FOREIGN_KEY_MODE: &str = "COFFEE_ETL_FOREIGN_KEY_MODE";
    pub const MODE: &str = "COFFEE_ETL_MODE";
    pub const LOCALE: &str = "COFFEE_ETL_LOCALE";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Stages hand records over in memory.
    #[default]
    Pipelined,
    /// Every stage writes zone artifacts the next stage reads back.
    Staged,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Pipelined => "pipelined",
            PipelineMode::Staged => "staged",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pipelined" | "pipeline" => Ok(PipelineMode::Pipelined),
            "staged" | "stage" => Ok(PipelineMode::Staged),
            other => Err(format!("unknown pipeline mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtlSettings {
    /// Directory scanned for the flat source files.
    pub data_dir: PathBuf,
    /// Zone artifacts, run logs and (by default) the queue store.
    pub staging_root: PathBuf,
    /// Where `DB_<run_id>.sqlite` files are created.
    pub destination_dir: PathBuf,
    pub broker_path: PathBuf,
    /// Relational source; `None` skips relational production.
    pub source_db_path: Option<PathBuf>,
    pub source_schema: String,
    pub load_batch_size: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub settle_initial_poll_ms: u64,
    pub settle_max_poll_ms: u64,
    pub settle_timeout_ms: u64,
    pub drain_poll_ms: u64,
    pub drain_deadline_ms: u64,
    pub foreign_key_mode: ForeignKeyMode,
    pub mode: PipelineMode,
    pub locale: String,
}

impl Default for EtlSettings {
    fn default() -> Self {
        let staging_root = PathBuf::from("staging");
        Self {
            data_dir: PathBuf::from("data"),
            broker_path: staging_root.join("broker.sqlite"),
            staging_root,
            destination_dir: PathBuf::from("warehouse"),
            source_db_path: None,
            source_schema: "main".to_string(),
            load_batch_size: 1_000,
            retry_attempts: 3,
            retry_delay_ms: 2_000,
            settle_initial_poll_ms: 50,
            settle_max_poll_ms: 1_000,
            settle_timeout_ms: 30_000,
            drain_poll_ms: 200,
            drain_deadline_ms: 300_000,
            foreign_key_mode: ForeignKeyMode::Soft,
            mode: PipelineMode::Pipelined,
            locale: crate::i18n::DEFAULT_LOCALE.to_string(),
        }
    }
}

/// `~` or `~/...` resolves against the user's home directory.
pub fn expand_path(raw: &str) -> PathBuf {
    match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            match dirs::home_dir() {
                Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                None => PathBuf::from(raw),
            }
        }
        _ => PathBuf::from(raw),
    }
}

fn parsed<T>(source: &dyn ConfigSource, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match source.get(key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
            message: e.to_string(),
        }),
    }
}

fn positive<T>(key: &str, value: T) -> ConfigResult<T>
where
    T: PartialOrd + Default + fmt::Display + Copy,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "must be greater than zero".to_string(),
        })
    }
}

impl EtlSettings {
    /// Defaults overridden by whatever `source` sets.
    pub fn from_source(source: &dyn ConfigSource) -> ConfigResult<Self> {
        use config_keys as k;
        let mut s = Self::default();

        if let Some(v) = source.get(k::DATA_DIR) {
            s.data_dir = expand_path(&v);
        }
        if let Some(v) = source.get(k::STAGING_ROOT) {
            s.staging_root = expand_path(&v);
            s.broker_path = s.staging_root.join("broker.sqlite");
        }
        if let Some(v) = source.get(k::DESTINATION_DIR) {
            s.destination_dir = expand_path(&v);
        }
        if let Some(v) = source.get(k::BROKER_PATH) {
            s.broker_path = expand_path(&v);
        }
        if let Some(v) = source.get(k::SOURCE_DB_PATH) {
            s.source_db_path = Some(expand_path(&v));
        }
        if let Some(v) = source.get(k::SOURCE_SCHEMA) {
            s.source_schema = v;
        }

        if let Some(v) = parsed::<usize>(source, k::LOAD_BATCH_SIZE)? {
            s.load_batch_size = positive(k::LOAD_BATCH_SIZE, v)?;
        }
        if let Some(v) = parsed::<u32>(source, k::RETRY_ATTEMPTS)? {
            s.retry_attempts = positive(k::RETRY_ATTEMPTS, v)?;
        }
        if let Some(v) = parsed(source, k::RETRY_DELAY_MS)? {
            s.retry_delay_ms = v;
        }
        if let Some(v) = parsed::<u64>(source, k::SETTLE_INITIAL_POLL_MS)? {
            s.settle_initial_poll_ms = positive(k::SETTLE_INITIAL_POLL_MS, v)?;
        }
        if let Some(v) = parsed::<u64>(source, k::SETTLE_MAX_POLL_MS)? {
            s.settle_max_poll_ms = positive(k::SETTLE_MAX_POLL_MS, v)?;
        }
        if let Some(v) = parsed(source, k::SETTLE_TIMEOUT_MS)? {
            s.settle_timeout_ms = v;
        }
        if let Some(v) = parsed::<u64>(source, k::DRAIN_POLL_MS)? {
            s.drain_poll_ms = positive(k::DRAIN_POLL_MS, v)?;
        }
        if let Some(v) = parsed(source, k::DRAIN_DEADLINE_MS)? {
            s.drain_deadline_ms = v;
        }
        if let Some(v) = parsed(source, k::FOREIGN_KEY_MODE)? {
            s.foreign_key_mode = v;
        }
        if let Some(v) = parsed(source, k::MODE)? {
            s.mode = v;
        }
        if let Some(v) = source.get(k::LOCALE) {
            s.locale = v;
        }
        Ok(s)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            initial_poll: Duration::from_millis(self.settle_initial_poll_ms),
            max_poll: Duration::from_millis(self.settle_max_poll_ms.max(self.settle_initial_poll_ms)),
            timeout: Duration::from_millis(self.settle_timeout_ms),
        }
    }

    pub fn drain_options(&self) -> DrainOptions {
        DrainOptions {
            poll_interval: Duration::from_millis(self.drain_poll_ms),
            deadline: Duration::from_millis(self.drain_deadline_ms),
        }
    }

    pub fn zone_layout(&self) -> ZoneLayout {
        ZoneLayout::new(&self.staging_root)
    }

    /// `<staging_root>/logs`
    pub fn run_log_dir(&self) -> PathBuf {
        self.staging_root.join("logs")
    }
}
