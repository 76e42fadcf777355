// ==========================================
// Coffee ETL - run log
// ==========================================
// `<staging_root>/logs/pipeline_run_<run_id>.log`, append-only
// plain text, independent of the tracing subscriber. Replays
// of a run append to the same file.
// ==========================================

use crate::engine::run_state::{RunState, Stage, StageRecord, StageStatus};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn run_log_path(log_dir: &Path, run_id: &str) -> PathBuf {
    log_dir.join(format!("pipeline_run_{}.log", run_id))
}

pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    pub fn open(log_dir: &Path, run_id: &str) -> io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let path = run_log_path(log_dir, run_id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(
            self.file,
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            text
        )?;
        self.file.flush()
    }

    pub fn run_started(&mut self, state: &RunState, action: &str) -> io::Result<()> {
        self.line(&format!(
            "RUN {} run_id={} mode={} database={}",
            action, state.run_id, state.mode, state.database_name
        ))
    }

    pub fn stage_started(&mut self, stage: Stage) -> io::Result<()> {
        self.line(&format!("STAGE {} START", stage))
    }

    pub fn stage_finished(&mut self, record: &StageRecord) -> io::Result<()> {
        let status = match &record.status {
            StageStatus::Running => "running".to_string(),
            StageStatus::Succeeded => "succeeded".to_string(),
            StageStatus::Failed(message) => format!("failed ({})", message),
        };
        self.line(&format!(
            "STAGE {} END status={} started={} finished={} duration_ms={}",
            record.stage,
            status,
            record.started_at.format("%H:%M:%S%.3f"),
            record
                .finished_at
                .map(|t| t.format("%H:%M:%S%.3f").to_string())
                .unwrap_or_default(),
            record.duration_ms.unwrap_or_default()
        ))
    }

    pub fn run_finished(&mut self, state: &RunState) -> io::Result<()> {
        for line in state.summary_lines() {
            self.line(&line)?;
        }
        self.line(&format!(
            "RUN END status={} duration_ms={}",
            state.status,
            state.elapsed_ms()
        ))
    }
}
