// ==========================================
// Coffee ETL - command-line entry
// ==========================================
// Settings from COFFEE_ETL_* environment variables,
// log level from RUST_LOG.
//
//   coffee-etl                     full run (mode from settings)
//   coffee-etl validate <run_id>   replay validation on a raw zone
//   coffee-etl load <run_id>       replay loading of a clean zone
// ==========================================

use anyhow::{bail, Context, Result};
use coffee_etl::config::{EnvConfigSource, EtlSettings};
use coffee_etl::{i18n, logging, Orchestrator};

/// `json` switches to one JSON object per log event.
const LOG_FORMAT_ENV: &str = "COFFEE_ETL_LOG_FORMAT";

enum Command {
    Run,
    Validate(String),
    Load(String),
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args {
        [] => Ok(Command::Run),
        [cmd] if cmd == "run" => Ok(Command::Run),
        [cmd, run_id] if cmd == "validate" => Ok(Command::Validate(run_id.clone())),
        [cmd, run_id] if cmd == "load" => Ok(Command::Load(run_id.clone())),
        _ => bail!("usage: coffee-etl [run | validate <run_id> | load <run_id>]"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    match std::env::var(LOG_FORMAT_ENV).as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{} {}", coffee_etl::APP_NAME, coffee_etl::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let settings = EtlSettings::from_source(&EnvConfigSource).context("invalid configuration")?;
    i18n::set_locale(&settings.locale);
    tracing::info!(
        mode = %settings.mode,
        data_dir = %settings.data_dir.display(),
        staging_root = %settings.staging_root.display(),
        destination_dir = %settings.destination_dir.display(),
        foreign_key_mode = ?settings.foreign_key_mode,
        "settings loaded"
    );

    let mut orchestrator = Orchestrator::from_settings(settings).context("pipeline setup failed")?;

    let state = match command {
        Command::Run => orchestrator.run().await,
        Command::Validate(run_id) => orchestrator.validate_raw_zone(&run_id).await,
        Command::Load(run_id) => orchestrator.load_clean_zone(&run_id).await,
    }
    .context("pipeline run failed")?;

    let totals = state.totals();
    tracing::info!(
        run_id = %state.run_id,
        database = %state.database_name,
        valid = totals.valid,
        invalid = totals.invalid,
        loaded = totals.loaded,
        "done"
    );
    Ok(())
}
