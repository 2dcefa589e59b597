//! Spendboard batch ingestion
//!
//! Loads an exported extraction file into PostgreSQL:
//! 1. Reads the JSON array (or single record)
//! 2. Maps each record to normalized rows
//! 3. Writes each document in its own transaction
//! 4. Reports totals; exits non-zero when anything failed

use anyhow::Context;
use clap::Parser;
use spendboard_common::{config::AppConfig, db::DbPool, Repository, VERSION};
use spendboard_ingestion::engine::{load_records, IngestionEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spendboard-ingest", version, about = "Load extraction records into the database")]
struct Args {
    /// JSON file holding an array of extraction records
    file: PathBuf,

    /// Log progress every N documents (overrides ingestion.progress_interval)
    #[arg(long)]
    progress_every: Option<usize>,

    /// Do not create missing tables before loading
    #[arg(long)]
    skip_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting Spendboard ingestion v{}", VERSION);

    // Fail fast on unreadable input before touching the database
    let docs = match load_records(&args.file).await {
        Ok(docs) => docs,
        Err(e) => {
            error!(error = %e, "Fatal error");
            return Ok(ExitCode::FAILURE);
        }
    };

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let repository = Repository::new(db);

    if config.database.create_schema && !args.skip_schema {
        repository.create_schema().await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, finishing current document...");
            let _ = shutdown_tx.send(true);
        }
    });

    let engine = IngestionEngine::new(Arc::new(repository)).with_progress_interval(
        args.progress_every
            .unwrap_or(config.ingestion.progress_interval),
    );

    let report = engine.ingest_batch_with_shutdown(&docs, shutdown_rx).await;

    info!("=== Ingestion Complete ===");
    info!("Total documents: {}", report.total);
    info!("Successfully processed: {}", report.succeeded);
    info!("Failed: {}", report.failed);
    if report.skipped > 0 {
        info!("Skipped: {}", report.skipped);
    }

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
