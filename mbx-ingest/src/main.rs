//! mbx-ingest - mobile backup ingestion CLI
//!
//! Runs the ingestion pipeline over one backup container, reports stored
//! run status, or categorizes an already-extracted tree.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mbx_common::config::LoggingConfig;
use mbx_ingest::db::{SqliteRecordStore, SqliteStatusStore, StatusStore};
use mbx_ingest::services::FileCategorizer;
use mbx_ingest::storage::FsObjectStore;
use mbx_ingest::{IngestConfig, IngestPipeline, JobRunner, RunId};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mbx-ingest
#[derive(Parser, Debug)]
#[command(name = "mbx-ingest")]
#[command(about = "Extract structured records from mobile backup containers")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(long, global = true, env = "MBX_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for working files, objects and the record store
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one backup container and print the run summary
    Ingest {
        #[arg(long)]
        run_id: String,

        /// Backup container file
        container: PathBuf,
    },

    /// Print the stored status of a run
    Status {
        #[arg(long)]
        run_id: String,
    },

    /// Categorize an extracted tree and print per-category counts
    Categorize {
        directory: PathBuf,
    },
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mbx_ingest={0},mbx_common={0}", logging.level).into());

    let file_layer = match &logging.file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = IngestConfig::resolve(args.config.as_deref(), args.root_folder.as_deref())
        .context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting mbx-ingest v{} (root folder {})",
        env!("CARGO_PKG_VERSION"),
        config.root_folder.display()
    );

    match args.command {
        Command::Ingest { run_id, container } => ingest(config, run_id, container).await,
        Command::Status { run_id } => status(config, run_id).await,
        Command::Categorize { directory } => categorize(directory),
    }
}

async fn ingest(config: IngestConfig, run_id: String, container: PathBuf) -> Result<()> {
    let run_id = RunId::new(run_id)?;
    config.ensure_directories()?;

    let pool = mbx_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open record store")?;
    info!("Database: {}", config.database_path.display());

    let pipeline = IngestPipeline::new(
        &config,
        config.build_unwrapper(),
        Arc::new(FsObjectStore::new(config.object_store_root.clone())),
        Arc::new(SqliteRecordStore::new(pool.clone())),
    );
    let runner = JobRunner::new(
        Arc::new(pipeline),
        Arc::new(SqliteStatusStore::new(pool)),
        config.run_timeout(),
    );

    let summary = runner.run_to_completion(&run_id, &container).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn status(config: IngestConfig, run_id: String) -> Result<()> {
    let run_id = RunId::new(run_id)?;
    let pool = mbx_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open record store")?;

    match SqliteStatusStore::new(pool).get(&run_id).await? {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => println!("No run recorded for {}", run_id),
    }
    Ok(())
}

fn categorize(directory: PathBuf) -> Result<()> {
    let result = FileCategorizer::new()
        .categorize(&directory)
        .with_context(|| format!("Failed to categorize {}", directory.display()))?;

    for (category, count) in &result.counts {
        println!("{:<10} {}", category.as_str(), count);
    }
    println!("{:<10} {}", "empty", result.zero_byte_files);
    for issue in &result.issues {
        println!("skipped    {} ({})", issue.path, issue.message);
    }
    Ok(())
}
