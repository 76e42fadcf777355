// ==========================================
// Coffee ETL - pipeline engine
// ==========================================
// Orchestrator, run state and run log.
// ==========================================

pub mod error;
pub mod orchestrator;
pub mod run_log;
pub mod run_state;

pub use error::{PipelineError, PipelineResult};
pub use orchestrator::Orchestrator;
pub use run_log::{run_log_path, RunLog};
pub use run_state::{
    new_run_id, DatasetStats, QueueStats, RunState, RunStatus, Stage, StageRecord, StageStatus,
};
