// ==========================================
// Configuration integration tests
// ==========================================
// Settings built from a key/value source drive the
// orchestrator's connections and run mode.
// ==========================================


use coffee_etl::config::{config_keys, MapConfigSource};
use coffee_etl::engine::{run_log_path, Stage};
use coffee_etl::{EtlSettings, Orchestrator, PipelineError, PipelineMode, RunStatus};
use std::time::Duration;
use test_helpers::{create_workspace, RUN_ID};

fn source_for(root: &std::path::Path) -> MapConfigSource {
    let root = root.to_string_lossy().to_string();
    MapConfigSource::new()
        .with(config_keys::DATA_DIR, &format!("{}/data", root))
        .with(config_keys::STAGING_ROOT, &format!("{}/staging", root))
        .with(config_keys::DESTINATION_DIR, &format!("{}/warehouse", root))
        .with(config_keys::RETRY_ATTEMPTS, "2")
        .with(config_keys::RETRY_DELAY_MS, "5")
        .with(config_keys::MODE, "staged")
}

#[tokio::test]
async fn test_settings_from_source_drive_orchestrator() {
    let (dir, _) = create_workspace().expect("workspace");
    let settings = EtlSettings::from_source(&source_for(dir.path())).expect("settings");

    assert_eq!(settings.mode, PipelineMode::Staged);
    assert_eq!(settings.broker_path, dir.path().join("staging").join("broker.sqlite"));
    assert_eq!(settings.retry_policy().attempts, 2);
    assert_eq!(settings.retry_policy().delay, Duration::from_millis(5));

    let mut orchestrator = Orchestrator::from_settings(settings.clone()).expect("setup");
    assert_eq!(orchestrator.settings(), &settings);
    assert!(orchestrator.broker().is_none());

    let state = orchestrator.run_with_id(RUN_ID).await.expect("run");
    assert!(state.stage(Stage::Connect).is_some());
    assert!(orchestrator.broker().is_some());
    assert!(settings.broker_path.exists());
}

#[tokio::test]
async fn test_unreachable_source_fails_after_retries() {
    let (dir, _) = create_workspace().expect("workspace");
    let missing = dir.path().join("missing.sqlite");
    let source = source_for(dir.path()).with(config_keys::SOURCE_DB_PATH, &missing.to_string_lossy());
    let settings = EtlSettings::from_source(&source).expect("settings");
    let mut orchestrator = Orchestrator::from_settings(settings.clone()).expect("setup");

    match orchestrator.run_with_id(RUN_ID).await {
        Err(PipelineError::Source(_)) => {}
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("missing source database must fail the run"),
    }
    assert!(!missing.exists());

    let state = orchestrator.last_run().expect("last run");
    match &state.status {
        RunStatus::Failed { stage, .. } => assert_eq!(*stage, Some(Stage::Connect)),
        other => panic!("unexpected status {:?}", other),
    }
    assert!(state.stage(Stage::SetupDatabase).is_none());

    let run_log = std::fs::read_to_string(run_log_path(&settings.run_log_dir(), RUN_ID)).expect("run log");
    assert!(run_log.contains("STAGE connect END status=failed"));
    assert!(run_log.contains("RUN END status=failed at connect"));
}

#[test]
fn test_invalid_value_is_rejected() {
    let source = MapConfigSource::new().with(config_keys::LOAD_BATCH_SIZE, "0");
    assert!(EtlSettings::from_source(&source).is_err());

    let source = MapConfigSource::new().with(config_keys::MODE, "sometimes");
    assert!(EtlSettings::from_source(&source).is_err());
}
