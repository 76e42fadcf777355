// ==========================================
// Coffee ETL - run state
// ==========================================
// Created when a run starts, finalized when it ends (either
// way). Holds per-stage timing and per-dataset counts.
// ==========================================

use crate::config::PipelineMode;
use crate::domain::DatasetKey;
use crate::loader::database_name;
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// `%Y%m%d_%H%M%S`
pub const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn new_run_id(now: NaiveDateTime) -> String {
    now.format(RUN_ID_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Connect,
    SetupDatabase,
    Produce,
    Settle,
    RawCapture,
    Validate,
    TransformLoad,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::SetupDatabase => "setup_database",
            Stage::Produce => "produce",
            Stage::Settle => "settle",
            Stage::RawCapture => "raw_capture",
            Stage::Validate => "validate",
            Stage::TransformLoad => "transform_load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Running,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: Stage,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub duration_ms: Option<u64>,
    pub status: StageStatus,
    started: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed { stage: Option<Stage>, message: String },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => f.write_str("running"),
            RunStatus::Succeeded => f.write_str("succeeded"),
            RunStatus::Failed { stage: Some(stage), message } => {
                write!(f, "failed at {}: {}", stage, message)
            }
            RunStatus::Failed { stage: None, message } => write!(f, "failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetStats {
    pub produced: usize,
    pub consumed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub transformed: usize,
    pub loaded: usize,
    pub failed_batches: usize,
}

impl DatasetStats {
    fn add(&mut self, other: &DatasetStats) {
        self.produced += other.produced;
        self.consumed += other.consumed;
        self.valid += other.valid;
        self.invalid += other.invalid;
        self.transformed += other.transformed;
        self.loaded += other.loaded;
        self.failed_batches += other.failed_batches;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub expected: usize,
    pub consumed: usize,
    pub lost: usize,
}

#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    pub database_name: String,
    pub mode: PipelineMode,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub stages: Vec<StageRecord>,
    pub datasets: BTreeMap<DatasetKey, DatasetStats>,
    pub queues: BTreeMap<String, QueueStats>,
    /// Messages published for tables no entity claims.
    pub unmapped: BTreeMap<String, usize>,
    pub source_failures: usize,
    pub status: RunStatus,
    started: Instant,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, mode: PipelineMode) -> Self {
        let run_id = run_id.into();
        Self {
            database_name: database_name(&run_id),
            run_id,
            mode,
            started_at: Local::now().naive_local(),
            finished_at: None,
            stages: Vec::new(),
            datasets: BTreeMap::new(),
            queues: BTreeMap::new(),
            unmapped: BTreeMap::new(),
            source_failures: 0,
            status: RunStatus::Running,
            started: Instant::now(),
        }
    }

    pub fn begin_stage(&mut self, stage: Stage) {
        self.stages.push(StageRecord {
            stage,
            started_at: Local::now().naive_local(),
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Running,
            started: Instant::now(),
        });
    }

    /// Close the most recent open record of `stage`.
    pub fn end_stage(&mut self, stage: Stage, failure: Option<String>) -> Option<&StageRecord> {
        let record = self
            .stages
            .iter_mut()
            .rev()
            .find(|r| r.stage == stage && r.status == StageStatus::Running)?;
        record.finished_at = Some(Local::now().naive_local());
        record.duration_ms = Some(record.started.elapsed().as_millis() as u64);
        record.status = match failure {
            Some(message) => StageStatus::Failed(message),
            None => StageStatus::Succeeded,
        };
        Some(&*record)
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().rev().find(|r| r.stage == stage)
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|r| matches!(r.status, StageStatus::Failed(_)))
            .map(|r| r.stage)
    }

    pub fn stats_mut(&mut self, key: DatasetKey) -> &mut DatasetStats {
        self.datasets.entry(key).or_default()
    }

    pub fn stats(&self, key: DatasetKey) -> DatasetStats {
        self.datasets.get(&key).copied().unwrap_or_default()
    }

    pub fn totals(&self) -> DatasetStats {
        let mut total = DatasetStats::default();
        for stats in self.datasets.values() {
            total.add(stats);
        }
        total
    }

    pub fn total_lost(&self) -> usize {
        self.queues.values().map(|q| q.lost).sum()
    }

    pub fn finalize(&mut self, status: RunStatus) {
        self.finished_at = Some(Local::now().naive_local());
        self.status = status;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Fixed-width summary table, one line per dataset plus a total.
    pub fn summary_lines(&self) -> Vec<String> {
        let header = format!(
            "{:<20} {:>8} {:>8} {:>8} {:>8} {:>11} {:>8} {:>8}",
            "dataset", "produced", "consumed", "valid", "invalid", "transformed", "loaded", "failed_b"
        );
        let row = |name: &str, s: &DatasetStats| {
            format!(
                "{:<20} {:>8} {:>8} {:>8} {:>8} {:>11} {:>8} {:>8}",
                name,
                s.produced,
                s.consumed,
                s.valid,
                s.invalid,
                s.transformed,
                s.loaded,
                s.failed_batches
            )
        };

        let mut lines = vec![header.clone(), "-".repeat(header.len())];
        for (key, stats) in &self.datasets {
            lines.push(row(&key.to_string(), stats));
        }
        lines.push("-".repeat(header.len()));
        lines.push(row("TOTAL", &self.totals()));
        if self.total_lost() > 0 {
            lines.push(format!("lost messages: {}", self.total_lost()));
        }
        for (name, count) in &self.unmapped {
            lines.push(format!("unmapped dataset {}: {} messages not validated", name, count));
        }
        if self.source_failures > 0 {
            lines.push(format!("unreadable sources: {}", self.source_failures));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, Provenance};
    use chrono::NaiveDate;

    #[test]
    fn test_run_id_format() {
        let now = NaiveDate::from_ymd_opt(2025, 1, 9)
            .unwrap()
            .and_hms_opt(7, 5, 3)
            .unwrap();
        assert_eq!(new_run_id(now), "20250109_070503");
        assert_eq!(RunState::new(new_run_id(now), PipelineMode::Staged).database_name, "DB_20250109_070503");
    }

    #[test]
    fn test_stage_lifecycle() {
        let mut state = RunState::new("r", PipelineMode::Pipelined);
        state.begin_stage(Stage::Produce);
        state.end_stage(Stage::Produce, None);
        state.begin_stage(Stage::Settle);
        state.end_stage(Stage::Settle, Some("timeout".to_string()));

        assert_eq!(state.stage(Stage::Produce).unwrap().status, StageStatus::Succeeded);
        assert!(state.stage(Stage::Produce).unwrap().duration_ms.is_some());
        assert_eq!(state.failed_stage(), Some(Stage::Settle));
        assert!(state.end_stage(Stage::Validate, None).is_none());
    }

    #[test]
    fn test_totals_and_summary() {
        let mut state = RunState::new("r", PipelineMode::Pipelined);
        let a = DatasetKey::new(EntityKind::Customer, Provenance::File);
        let b = DatasetKey::new(EntityKind::Customer, Provenance::Relational);
        state.stats_mut(a).valid = 3;
        state.stats_mut(a).invalid = 1;
        state.stats_mut(b).valid = 2;
        state.unmapped.insert("nha_cung_cap".to_string(), 4);

        let totals = state.totals();
        assert_eq!(totals.valid, 5);
        assert_eq!(totals.invalid, 1);

        let lines = state.summary_lines();
        assert!(lines.iter().any(|l| l.starts_with("customer_csv")));
        assert!(lines.iter().any(|l| l.starts_with("TOTAL")));
        assert!(lines.iter().any(|l| l.contains("nha_cung_cap")));
    }
}
