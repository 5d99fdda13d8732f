//! csvlake - CSV to Parquet ingestion tool

use anyhow::{bail, Context, Result};
use clap::Parser;
use csvlake_common::logging::{init_logging, LogConfig, LogLevel};
use csvlake_ingest::dataset::statistics;
use csvlake_ingest::encoder::decode;
use csvlake_ingest::storage::{ObjectStore, S3Storage};
use csvlake_ingest::{ArchiveOutcome, Dispatcher, IngestPipeline, Settings, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "csvlake")]
#[command(author, version, about = "CSV to Parquet data-lake ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Handle an S3 notification batch and print the handler response
    Handle {
        /// Event JSON file (stdin when omitted)
        #[arg(short, long)]
        event: Option<PathBuf>,
    },

    /// Ingest one raw object
    Process {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        key: String,
    },

    /// List object keys
    List {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long, default_value = "")]
        prefix: String,
    },

    /// Show object metadata
    Stat {
        #[arg(short, long)]
        bucket: String,

        #[arg(short, long)]
        key: String,
    },

    /// Move a raw object under the processed or failed prefix
    Archive {
        #[arg(short, long)]
        key: String,

        /// processed or failed
        #[arg(short, long)]
        outcome: ArchiveOutcome,
    },

    /// Print statistics of a local Parquet file
    Inspect { path: PathBuf },
}

async fn build_pipeline() -> Result<IngestPipeline> {
    let settings = Settings::from_env().context("Invalid configuration")?;
    let storage = S3Storage::new(&settings.s3.connection).await;
    Ok(IngestPipeline::new(
        Arc::new(settings),
        Arc::new(storage),
        Arc::new(SystemClock),
    ))
}

async fn read_event(path: Option<PathBuf>) -> Result<serde_json::Value> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read event from stdin")?;
            buf
        },
    };
    serde_json::from_str(&raw).context("Event is not valid JSON")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut log_config, env_error) = match LogConfig::from_env() {
        Ok(config) => (config, None),
        Err(e) => (LogConfig::default(), Some(e)),
    };
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _guard = init_logging(&log_config)?;
    if let Some(e) = env_error {
        warn!(error = %e, "Ignoring invalid logging environment, using defaults");
    }

    match cli.command {
        Command::Handle { event } => {
            let raw = read_event(event).await?;
            let dispatcher = Dispatcher::new(build_pipeline().await?);
            let response = dispatcher.handle_json(raw).await;
            println!("{}", response.to_lambda_json()?);
        },
        Command::Process { bucket, key } => {
            let result = build_pipeline().await?.process(&bucket, &key).await;
            print_json(&result)?;
            if let Some(error) = result.error() {
                bail!("Processing failed: {}", error);
            }
        },
        Command::List { bucket, prefix } => {
            let settings = Settings::from_env().context("Invalid configuration")?;
            let storage = S3Storage::new(&settings.s3.connection).await;
            for key in storage.list(&bucket, &prefix).await? {
                println!("{}", key);
            }
        },
        Command::Stat { bucket, key } => {
            let settings = Settings::from_env().context("Invalid configuration")?;
            let storage = S3Storage::new(&settings.s3.connection).await;
            print_json(&storage.head(&bucket, &key).await?)?;
        },
        Command::Archive { key, outcome } => {
            let dest = build_pipeline().await?.archive(&key, outcome).await?;
            info!(to = %dest, "Archived {}", key);
        },
        Command::Inspect { path } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let dataset = decode(&data)?;
            print_json(&statistics(Some(&dataset)))?;
        },
    }

    info!("Done");
    Ok(())
}
