// ==========================================
// Coffee ETL - configuration sources
// ==========================================
// Where overrides come from. Production reads the process
// environment; tests hand in a map.
// ==========================================

use std::collections::HashMap;

pub trait ConfigSource: Send + Sync {
    /// Raw value for `key`, if set. Blank values count as unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment (`COFFEE_ETL_*`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MapConfigSource {
    values: HashMap<String, String>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
