// ==========================================
// Coffee ETL - foreign-key reference sets
// ==========================================
// A present set (even an empty one) makes the foreign-key
// check strict. An absent set skips the check.
// ==========================================

use crate::domain::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How reference sets are obtained during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyMode {
    /// Only caller-supplied sets; absent sets skip the check.
    #[default]
    Soft,
    /// Sets built from ids accepted earlier in the same run.
    RunScoped,
}

impl std::str::FromStr for ForeignKeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "soft" => Ok(ForeignKeyMode::Soft),
            "run_scoped" | "run-scoped" => Ok(ForeignKeyMode::RunScoped),
            other => Err(format!("unknown foreign key mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSets {
    sets: HashMap<EntityKind, HashSet<i64>>,
}

impl ReferenceSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: EntityKind, ids: impl IntoIterator<Item = i64>) -> Self {
        self.insert(kind, ids);
        self
    }

    pub fn insert(&mut self, kind: EntityKind, ids: impl IntoIterator<Item = i64>) {
        self.sets.insert(kind, ids.into_iter().collect());
    }

    pub fn get(&self, kind: EntityKind) -> Option<&HashSet<i64>> {
        self.sets.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets in `self` win over the ones in `fallback`.
    pub fn merged_over(&self, fallback: &ReferenceSets) -> ReferenceSets {
        let mut sets = fallback.sets.clone();
        for (kind, ids) in &self.sets {
            sets.insert(*kind, ids.clone());
        }
        ReferenceSets { sets }
    }
}
