use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};

use weather_ingest::{
    IngestConfig, IngestError, OpenMeteoArchiveClient, SqliteStore, SyncController, SyncReport, SyncSettings,
    TokioSleeper, logging,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            for outcome in report.failed() {
                error!("Re-run required for {}", outcome.region);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            if let Some(ingest_error) = e.downcast_ref::<IngestError>() {
                eprintln!("{}", ingest_error.user_message());
            }
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<SyncReport> {
    // Optional path to a TOML config file; everything else comes from the environment
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = IngestConfig::load_from_path(config_path)?;

    logging::init(&config.logging)?;
    info!("weather-ingest {} starting with {} regions", weather_ingest::VERSION, config.regions.len());

    let store = SqliteStore::connect(&config.store)
        .await
        .map_err(IngestError::from)
        .with_context(|| format!("Failed to open observation store {}", config.store.database_url))?;
    let source = OpenMeteoArchiveClient::new(&config.source)?;
    let settings = SyncSettings::from_config(&config)?;

    let controller = SyncController::new(
        Arc::new(source),
        Arc::new(store),
        Arc::new(TokioSleeper),
        settings,
    );

    let today = config.source.today(Utc::now())?;
    Ok(controller.run(&config.regions, today).await)
}
