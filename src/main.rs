//! floe: a standalone tool for consolidating SQLite databases.
//!
//! Dumps large-enough source tables to CSV, classifies and normalizes
//! column semantics, and reloads everything into one searchable SQLite
//! store, with per-stage checkpoint logs making reruns cheap.

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floe::config::Config;
use floe::error::{ConfigSnafu, PipelineError};
use floe::pipeline::{run_dump, run_migrate, run_relabel, StageStats};

/// SQLite consolidation pipeline.
#[derive(Parser, Debug)]
#[command(name = "floe")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    stage: Stage,
}

/// Pipeline stage to run.
#[derive(Subcommand, Debug)]
enum Stage {
    /// Dump source database tables to CSV, gated by row count.
    Dump,
    /// Migrate CSV files into the consolidated store.
    Migrate,
    /// Rename columns in place based on classification.
    Relabel,
    /// Run dump, migrate and relabel in order.
    Run,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("floe starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source databases: {}", config.source.db_dir);
        info!("Source table: {}", config.source.table);
        info!("CSV exchange: {}", config.source.csv_dir);
        info!("Sink: {} (table {})", config.sink.path, config.sink.table);
        if let Some(fts) = &config.sink.fts_table {
            info!("FTS index: {}", fts);
        }
        info!("Checkpoints: {}", config.checkpoint.path);
        info!(
            "Limits: chunk_size={}, dump_chunk_size={}, row_cap={}, sample_size={}, label_threshold={}, max_workers={}",
            config.limits.chunk_size,
            config.limits.dump_chunk_size,
            config.limits.row_cap,
            config.limits.sample_size,
            config.limits.label_threshold,
            config.limits.max_workers
        );
        info!("Configuration is valid");
        return Ok(());
    }

    match args.stage {
        Stage::Dump => report("dump", run_dump(&config).await?),
        Stage::Migrate => report("migrate", run_migrate(&config).await?),
        Stage::Relabel => report("relabel", run_relabel(&config).await?),
        Stage::Run => {
            report("dump", run_dump(&config).await?);
            report("migrate", run_migrate(&config).await?);
            report("relabel", run_relabel(&config).await?);
        }
    }

    Ok(())
}

/// Print a stage summary.
fn report(stage: &str, stats: StageStats) {
    info!("{} completed", stage);
    info!("  Items processed: {}", stats.items_processed);
    info!("  Items skipped: {}", stats.items_skipped);
    info!("  Items failed: {}", stats.items_failed);
    info!("  Rows written: {}", stats.rows_written);
    info!("  Chunks written: {}", stats.chunks_written);
}
