// ==========================================
// Coffee ETL - pipeline orchestrator
// ==========================================
// [connect] -> setup database -> produce -> settle
//   -> raw capture -> validate -> transform & load
//
// Pipelined mode hands records between stages in memory.
// Staged mode writes raw/clean/error zone artifacts so the
// validate and load stages can be replayed for a run_id.
// Stage timing and counts always reach the run log, also
// when a stage fails.
// ==========================================

use crate::broker::{
    drain_queue, settle_queues, BrokerError, MessageBroker, ProduceReport, Producer, SqliteBroker,
};
use crate::config::{EtlSettings, PipelineMode};
use crate::domain::{CapturedRecord, DatasetKey, EntityKind, Message, Provenance};
use crate::engine::error::{PipelineError, PipelineResult};
use crate::engine::run_log::RunLog;
use crate::engine::run_state::{new_run_id, QueueStats, RunState, RunStatus, Stage};
use crate::loader::{SqliteDestination, StagingLoader};
use crate::quality::{QualityEngine, RuleRegistry, ValidRecord, ValidationReport};
use crate::retry::retry_fixed;
use crate::source::{CsvFileSource, FileSource, RelationalSource, SqliteSource};
use crate::transform::{transform_row, TransformedRow};
use crate::zone::{read_zone_file, ZoneError, ZoneKind, ZoneLayout, ZoneWriter};
use chrono::Local;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

// ==========================================
// Capture sinks
// ==========================================
// Local effect of one drained message. The message is acked
// only after `accept` returned Ok.
trait CaptureSink {
    fn accept(&mut self, key: DatasetKey, record: CapturedRecord) -> Result<(), ZoneError>;
}

#[derive(Default)]
struct MemorySink {
    rows: BTreeMap<DatasetKey, Vec<CapturedRecord>>,
}

impl CaptureSink for MemorySink {
    fn accept(&mut self, key: DatasetKey, record: CapturedRecord) -> Result<(), ZoneError> {
        self.rows.entry(key).or_default().push(record);
        Ok(())
    }
}

struct RawZoneSink {
    layout: ZoneLayout,
    run_id: String,
    writers: BTreeMap<DatasetKey, ZoneWriter>,
}

impl CaptureSink for RawZoneSink {
    fn accept(&mut self, key: DatasetKey, record: CapturedRecord) -> Result<(), ZoneError> {
        let writer = self.writers.entry(key).or_insert_with(|| {
            ZoneWriter::new(self.layout.file_path(ZoneKind::Raw, key, &self.run_id), false)
        });
        writer.append(record.row_number, &record.fields, &record.metadata, None)
    }
}

impl RawZoneSink {
    fn finish(self) -> Result<Vec<(DatasetKey, PathBuf, usize)>, ZoneError> {
        let mut written = Vec::new();
        for (key, writer) in self.writers {
            let path = writer.path().to_path_buf();
            let rows = writer.finish()?;
            written.push((key, path, rows));
        }
        Ok(written)
    }
}

// ==========================================
// RunContext - state + run log of one invocation
// ==========================================
struct RunContext {
    state: RunState,
    log: Option<RunLog>,
}

impl RunContext {
    fn open(settings: &EtlSettings, run_id: &str, mode: PipelineMode, action: &str) -> Self {
        let state = RunState::new(run_id, mode);
        let log = match RunLog::open(&settings.run_log_dir(), run_id) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(run_id, error = %e, "run log unavailable, continuing without it");
                None
            }
        };
        let mut ctx = Self { state, log };
        let state = ctx.state.clone();
        ctx.note(|log| log.run_started(&state, action));
        ctx
    }

    fn note<F>(&mut self, write: F)
    where
        F: FnOnce(&mut RunLog) -> io::Result<()>,
    {
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = write(log) {
                warn!(path = %log.path().display(), error = %e, "run log write failed");
            }
        }
    }

    fn begin(&mut self, stage: Stage) {
        info!(run_id = %self.state.run_id, stage = %stage, "stage started");
        self.state.begin_stage(stage);
        self.note(|log| log.stage_started(stage));
    }

    /// Record the stage outcome and hand the result back unchanged.
    fn finish<T>(&mut self, stage: Stage, result: PipelineResult<T>) -> PipelineResult<T> {
        let failure = result.as_ref().err().map(|e| e.to_string());
        let record = self.state.end_stage(stage, failure.clone()).cloned();
        match &failure {
            None => info!(
                run_id = %self.state.run_id,
                stage = %stage,
                duration_ms = record.as_ref().and_then(|r| r.duration_ms).unwrap_or_default(),
                "stage finished"
            ),
            Some(message) => error!(
                run_id = %self.state.run_id,
                stage = %stage,
                error = %message,
                "stage failed"
            ),
        }
        if let Some(record) = record {
            self.note(|log| log.stage_finished(&record));
        }
        result
    }

    fn close(mut self, result: &PipelineResult<()>) -> RunState {
        let status = match result {
            Ok(()) => RunStatus::Succeeded,
            Err(e) => RunStatus::Failed {
                stage: self.state.failed_stage(),
                message: e.to_string(),
            },
        };
        self.state.finalize(status);

        for line in self.state.summary_lines() {
            info!(target: "summary", "{}", line);
        }
        let state = self.state.clone();
        self.note(|log| log.run_finished(&state));

        if self.state.status.is_success() {
            info!(
                run_id = %self.state.run_id,
                elapsed_ms = self.state.elapsed_ms(),
                "pipeline run finished"
            );
        } else {
            error!(run_id = %self.state.run_id, status = %self.state.status, "pipeline run failed");
        }
        self.state
    }
}

/// Connections opened by the first run's `connect` stage.
#[derive(Debug, Clone)]
struct PendingConnections {
    broker_path: PathBuf,
    source_db_path: Option<PathBuf>,
}

// ==========================================
// Orchestrator
// ==========================================
pub struct Orchestrator {
    settings: EtlSettings,
    broker: Option<Arc<dyn MessageBroker>>,
    pending: Option<PendingConnections>,
    file_source: Arc<dyn FileSource>,
    relational_source: Option<Arc<dyn RelationalSource>>,
    engine: QualityEngine,
    last_run: Option<RunState>,
}

impl Orchestrator {
    pub fn new(settings: EtlSettings, broker: Arc<dyn MessageBroker>, engine: QualityEngine) -> Self {
        Self {
            settings,
            broker: Some(broker),
            pending: None,
            file_source: Arc::new(CsvFileSource),
            relational_source: None,
            engine,
            last_run: None,
        }
    }

    /// Durable queue store and (if configured) relational source from the
    /// settings. Both are connected inside the run, so an unreachable one
    /// fails the `connect` stage and still reaches the run log.
    pub fn from_settings(settings: EtlSettings) -> PipelineResult<Self> {
        let engine = QualityEngine::new(RuleRegistry::new()?, settings.foreign_key_mode);
        let pending = PendingConnections {
            broker_path: settings.broker_path.clone(),
            source_db_path: settings.source_db_path.clone(),
        };
        Ok(Self {
            settings,
            broker: None,
            pending: Some(pending),
            file_source: Arc::new(CsvFileSource),
            relational_source: None,
            engine,
            last_run: None,
        })
    }

    pub fn with_file_source(mut self, source: Arc<dyn FileSource>) -> Self {
        self.file_source = source;
        self
    }

    pub fn with_relational_source(mut self, source: Arc<dyn RelationalSource>) -> Self {
        self.relational_source = Some(source);
        self
    }

    pub fn settings(&self) -> &EtlSettings {
        &self.settings
    }

    /// None until the first run connected it.
    pub fn broker(&self) -> Option<&Arc<dyn MessageBroker>> {
        self.broker.as_ref()
    }

    /// Custom rules, reference sets and the clock live on the engine.
    pub fn engine_mut(&mut self) -> &mut QualityEngine {
        &mut self.engine
    }

    /// State of the most recent invocation, also after a failure.
    pub fn last_run(&self) -> Option<&RunState> {
        self.last_run.as_ref()
    }

    /// Full run with a fresh timestamp run_id.
    pub async fn run(&mut self) -> PipelineResult<RunState> {
        let run_id = new_run_id(Local::now().naive_local());
        self.run_with_id(&run_id).await
    }

    pub async fn run_with_id(&mut self, run_id: &str) -> PipelineResult<RunState> {
        let mut ctx = RunContext::open(&self.settings, run_id, self.settings.mode, "START");
        info!(run_id, mode = %self.settings.mode, "pipeline run started");
        let result = self.execute(run_id, &mut ctx).await;
        self.finish_run(ctx, result)
    }

    /// Re-run validation against an existing raw zone.
    pub async fn validate_raw_zone(&mut self, run_id: &str) -> PipelineResult<RunState> {
        let mut ctx = RunContext::open(&self.settings, run_id, PipelineMode::Staged, "REPLAY validate");
        self.engine.reset();
        ctx.begin(Stage::Validate);
        let result = self.validate_zone(run_id, &mut ctx.state);
        let result = ctx.finish(Stage::Validate, result);
        self.finish_run(ctx, result)
    }

    /// Re-run transform & load against an existing clean zone.
    pub async fn load_clean_zone(&mut self, run_id: &str) -> PipelineResult<RunState> {
        let mut ctx = RunContext::open(&self.settings, run_id, PipelineMode::Staged, "REPLAY load");
        let result = self.replay_load(run_id, &mut ctx).await;
        self.finish_run(ctx, result)
    }

    fn finish_run(&mut self, ctx: RunContext, result: PipelineResult<()>) -> PipelineResult<RunState> {
        let state = ctx.close(&result);
        self.last_run = Some(state.clone());
        result.map(|()| state)
    }

    async fn execute(&mut self, run_id: &str, ctx: &mut RunContext) -> PipelineResult<()> {
        self.engine.reset();

        if self.pending.is_some() {
            ctx.begin(Stage::Connect);
            let result = self.connect().await;
            ctx.finish(Stage::Connect, result)?;
        }
        let broker = self.connected_broker()?;

        ctx.begin(Stage::SetupDatabase);
        let result = self.setup_database(run_id, true).await;
        let loader = ctx.finish(Stage::SetupDatabase, result)?;

        ctx.begin(Stage::Produce);
        let result = self.produce(run_id, &mut ctx.state).await;
        let produced = ctx.finish(Stage::Produce, result)?;

        ctx.begin(Stage::Settle);
        let result = settle_queues(
            broker.as_ref(),
            &produced.queue_counts,
            &self.settings.settle_policy(),
        )
        .await
        .map_err(PipelineError::from);
        ctx.finish(Stage::Settle, result)?;

        for (name, count) in &produced.unmapped {
            warn!(dataset = %name, messages = count, "no validator for dataset, queue left undrained");
        }

        match self.settings.mode {
            PipelineMode::Pipelined => {
                ctx.begin(Stage::RawCapture);
                let mut sink = MemorySink::default();
                let result = self.capture(&mut ctx.state, &mut sink).await;
                ctx.finish(Stage::RawCapture, result)?;

                ctx.begin(Stage::Validate);
                let mut valid = BTreeMap::new();
                for key in DatasetKey::all() {
                    let rows = sink.rows.remove(&key).unwrap_or_default();
                    let report = self.validate_rows(key, &rows, &mut ctx.state);
                    valid.insert(key, report.valid);
                }
                ctx.finish(Stage::Validate, Ok(()))?;

                ctx.begin(Stage::TransformLoad);
                let mut result = Ok(());
                for (key, rows) in &valid {
                    result = self.load_rows(&loader, *key, rows, &mut ctx.state).await;
                    if result.is_err() {
                        break;
                    }
                }
                ctx.finish(Stage::TransformLoad, result)?;
            }
            PipelineMode::Staged => {
                ctx.begin(Stage::RawCapture);
                let result = self.capture_to_zone(run_id, &mut ctx.state).await;
                ctx.finish(Stage::RawCapture, result)?;

                ctx.begin(Stage::Validate);
                let result = self.validate_zone(run_id, &mut ctx.state);
                ctx.finish(Stage::Validate, result)?;

                ctx.begin(Stage::TransformLoad);
                let result = self.load_zone(run_id, &loader, &mut ctx.state).await;
                ctx.finish(Stage::TransformLoad, result)?;
            }
        }
        Ok(())
    }

    async fn replay_load(&mut self, run_id: &str, ctx: &mut RunContext) -> PipelineResult<()> {
        ctx.begin(Stage::SetupDatabase);
        let result = self.setup_database(run_id, false).await;
        let loader = ctx.finish(Stage::SetupDatabase, result)?;

        ctx.begin(Stage::TransformLoad);
        let result = self.load_zone(run_id, &loader, &mut ctx.state).await;
        ctx.finish(Stage::TransformLoad, result)
    }

    // ==========================================
    // Stages
    // ==========================================

    async fn connect(&mut self) -> PipelineResult<()> {
        let Some(pending) = self.pending.clone() else {
            return Ok(());
        };
        let policy = self.settings.retry_policy();
        let broker = SqliteBroker::connect(&pending.broker_path, &policy).await?;
        self.broker = Some(Arc::new(broker));

        if let Some(path) = &pending.source_db_path {
            let source = retry_fixed("source_connect", &policy, || async { SqliteSource::open(path) }).await?;
            self.relational_source = Some(Arc::new(source));
        }
        self.pending = None;
        info!(broker = %pending.broker_path.display(), "connections ready");
        Ok(())
    }

    fn connected_broker(&self) -> PipelineResult<Arc<dyn MessageBroker>> {
        self.broker
            .clone()
            .ok_or_else(|| PipelineError::from(BrokerError::Connection("broker not connected".to_string())))
    }

    /// `fresh`: a full run owns a new database; the load replay appends
    /// to the existing one.
    async fn setup_database(&self, run_id: &str, fresh: bool) -> PipelineResult<StagingLoader> {
        let dir = &self.settings.destination_dir;
        let policy = self.settings.retry_policy();
        let destination = if fresh {
            SqliteDestination::create_for_run(dir, run_id, &policy).await?
        } else {
            SqliteDestination::connect_for_run(dir, run_id, &policy).await?
        };
        let loader = StagingLoader::new(Arc::new(destination), self.settings.load_batch_size);
        loader.ensure_schema().await?;
        Ok(loader)
    }

    async fn produce(&self, run_id: &str, state: &mut RunState) -> PipelineResult<ProduceReport> {
        let producer = Producer::new(self.connected_broker()?, run_id);
        let mut report = producer
            .produce_files(self.file_source.as_ref(), &self.settings.data_dir)
            .await?;

        match &self.relational_source {
            Some(source) => {
                let relational = producer
                    .produce_relational(source.as_ref(), &self.settings.source_schema)
                    .await?;
                report.merge(relational);
            }
            None => info!("no relational source configured"),
        }

        for (key, count) in &report.produced {
            state.stats_mut(*key).produced += count;
        }
        state.unmapped = report.unmapped.clone();
        state.source_failures = report.failures.len();

        info!(
            published = report.total_published(),
            queues = report.queue_counts.len(),
            failures = report.failures.len(),
            "produce finished"
        );
        Ok(report)
    }

    /// Drain every entity queue into `sink`, one queue at a time.
    async fn capture(&self, state: &mut RunState, sink: &mut dyn CaptureSink) -> PipelineResult<()> {
        let options = self.settings.drain_options();
        let broker = self.connected_broker()?;

        for kind in EntityKind::DEPENDENCY_ORDER {
            let queue = kind.queue_name();
            broker.declare_queue(&queue).await?;

            let mut row_numbers: HashMap<Provenance, usize> = HashMap::new();
            let mut consumed: BTreeMap<DatasetKey, usize> = BTreeMap::new();

            let report = drain_queue(broker.as_ref(), &queue, &options, |message: Message| {
                if message.entity_kind() != Some(kind) {
                    return Err(format!(
                        "entity type {:?} does not belong on {}",
                        message.entity_type, queue
                    ));
                }
                let key = DatasetKey::new(kind, message.source);
                let row_number = row_numbers.entry(message.source).or_default();
                *row_number += 1;
                let record = CapturedRecord {
                    row_number: *row_number,
                    fields: message.record(),
                    metadata: message.metadata,
                };
                sink.accept(key, record).map_err(|e| e.to_string())?;
                *consumed.entry(key).or_default() += 1;
                Ok(())
            })
            .await?;

            state.queues.insert(
                queue.clone(),
                QueueStats {
                    expected: report.expected,
                    consumed: report.consumed,
                    lost: report.lost,
                },
            );
            for (key, count) in consumed {
                state.stats_mut(key).consumed += count;
            }
        }
        Ok(())
    }

    async fn capture_to_zone(&self, run_id: &str, state: &mut RunState) -> PipelineResult<()> {
        let layout = self.settings.zone_layout();
        layout.ensure_dirs()?;
        let mut sink = RawZoneSink {
            layout,
            run_id: run_id.to_string(),
            writers: BTreeMap::new(),
        };
        self.capture(state, &mut sink).await?;
        for (key, path, rows) in sink.finish()? {
            info!(dataset = %key, path = %path.display(), rows, "raw artifact written");
        }
        Ok(())
    }

    fn validate_rows(&mut self, key: DatasetKey, rows: &[CapturedRecord], state: &mut RunState) -> ValidationReport {
        let report = self.engine.validate_dataset(key, rows);
        let stats = state.stats_mut(key);
        stats.valid += report.valid.len();
        stats.invalid += report.rejected.len();
        report
    }

    /// Raw artifacts of `run_id` -> clean and error artifacts.
    fn validate_zone(&mut self, run_id: &str, state: &mut RunState) -> PipelineResult<()> {
        let layout = self.settings.zone_layout();
        layout.ensure_dirs()?;
        let raw: BTreeMap<DatasetKey, PathBuf> = layout.existing_files(ZoneKind::Raw, run_id).into_iter().collect();
        if raw.is_empty() {
            warn!(run_id, "no raw artifacts found");
        }

        // dependency order: DatasetKey::all(), not file-name order
        for key in DatasetKey::all() {
            let Some(path) = raw.get(&key) else {
                continue;
            };
            let rows: Vec<CapturedRecord> = read_zone_file(path)?
                .into_iter()
                .map(|r| CapturedRecord {
                    row_number: r.row_number,
                    fields: r.fields,
                    metadata: r.metadata,
                })
                .collect();
            let fields: Vec<String> = rows
                .first()
                .map(|r| r.fields.keys().cloned().collect())
                .unwrap_or_default();

            let report = self.validate_rows(key, &rows, state);

            let mut clean = ZoneWriter::new(layout.file_path(ZoneKind::Clean, key, run_id), false)
                .with_fields(fields.clone());
            for row in &report.valid {
                clean.append(row.row_number, &row.fields, &row.metadata, None)?;
            }
            let mut rejected = ZoneWriter::new(layout.file_path(ZoneKind::Error, key, run_id), true)
                .with_fields(fields);
            for row in &report.rejected {
                rejected.append(row.row_number, &row.fields, &row.metadata, Some(row.reasons().as_str()))?;
            }
            let clean_rows = clean.finish()?;
            let error_rows = rejected.finish()?;
            info!(dataset = %key, clean = clean_rows, error = error_rows, "zone artifacts written");
        }
        Ok(())
    }

    async fn load_rows(
        &self,
        loader: &StagingLoader,
        key: DatasetKey,
        rows: &[ValidRecord],
        state: &mut RunState,
    ) -> PipelineResult<()> {
        let shape = key.shape();
        let transformed: Vec<TransformedRow> = rows
            .iter()
            .map(|r| transform_row(shape, &r.fields, r.metadata.extract_time))
            .collect();
        state.stats_mut(key).transformed += transformed.len();

        let report = loader.load_dataset(key, &transformed).await?;
        let stats = state.stats_mut(key);
        stats.loaded += report.loaded;
        stats.failed_batches += report.failed_batches;
        Ok(())
    }

    /// Clean artifacts of `run_id` -> staging tables.
    async fn load_zone(&self, run_id: &str, loader: &StagingLoader, state: &mut RunState) -> PipelineResult<()> {
        let layout = self.settings.zone_layout();
        let clean = layout.existing_files(ZoneKind::Clean, run_id);
        if clean.is_empty() {
            warn!(run_id, "no clean artifacts found");
        }
        for (key, path) in clean {
            let rows: Vec<ValidRecord> = read_zone_file(&path)?
                .into_iter()
                .map(|r| ValidRecord {
                    row_number: r.row_number,
                    fields: r.fields,
                    metadata: r.metadata,
                })
                .collect();
            self.load_rows(loader, key, &rows, state).await?;
        }
        Ok(())
    }
}
