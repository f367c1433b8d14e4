//! Lineup Ingest - load performance CSV files from the command line

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lineup_common::logging::{init_logging, LogConfig, LogLevel};
use lineup_ingest::config::IngestConfig;
use lineup_ingest::handler::{
    context_from_env, load_aws_config, notifier_for, IngestContext, InvocationResponse,
};
use lineup_ingest::notify::{LogNotifier, Notifier};
use lineup_ingest::source::{LocalFileReader, ObjectLocation};
use lineup_ingest::store::{DynamoPerformanceStore, MemoryPerformanceStore, PerformanceStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lineup-ingest")]
#[command(author, version, about = "Load performance schedule CSV files")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a local CSV file
    Load {
        /// CSV file with Stage, Date, Start, Performer and End columns
        #[arg(short, long)]
        file: PathBuf,

        /// Validate and write into an in-memory table instead of DynamoDB
        #[arg(long)]
        dry_run: bool,
    },

    /// Process an S3 object the way the upload trigger does
    S3 {
        #[arg(short, long, env = "LINEUP_BUCKET")]
        bucket: String,

        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::for_cli("lineup-ingest")
        .with_level(log_level)
        .with_env_overrides()?;
    let _log_guard = init_logging(&log_config)?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let response = match cli.command {
        Command::Load { file, dry_run } => load_file(&file, dry_run, &cancel).await?,
        Command::S3 { bucket, key } => {
            let (_, context) = context_from_env().await?;
            let location = ObjectLocation::new(bucket, key);
            let report = context.process_object(&location, &cancel).await;
            InvocationResponse::from_reports(vec![report])
        },
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to encode response")?
    );

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn load_file(
    file: &Path,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<InvocationResponse> {
    let config = IngestConfig::from_env().context("Failed to load configuration")?;

    let root = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let key = file
        .file_name()
        .with_context(|| format!("{} is not a file path", file.display()))?
        .to_string_lossy()
        .into_owned();
    let location = ObjectLocation::new("", key);

    let memory = Arc::new(MemoryPerformanceStore::new());
    let aws_config = if dry_run {
        info!("Dry run: rows are written to an in-memory table");
        None
    } else {
        Some(load_aws_config(&config).await)
    };

    let store: Arc<dyn PerformanceStore> = match &aws_config {
        Some(aws_config) => Arc::new(DynamoPerformanceStore::new(aws_config, &config.table)),
        None => memory.clone(),
    };
    let notifier: Arc<dyn Notifier> = match &aws_config {
        Some(aws_config) => notifier_for(&config, aws_config),
        None => Arc::new(LogNotifier),
    };

    let context = IngestContext::new(
        Arc::new(LocalFileReader::new(root)),
        store,
        notifier,
        config.coordinator_config(),
    );
    let report = context.process_object(&location, cancel).await;

    if dry_run {
        info!(items = memory.len().await, "Dry run complete");
    }

    Ok(InvocationResponse::from_reports(vec![report]))
}

/// First Ctrl-C stops new writes; the current row still finishes
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current row");
            cancel.cancel();
        }
    });
}
