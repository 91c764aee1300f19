//! Dump stage: source databases to CSV, gated by row count.
//!
//! Tables over the configured row cap are skipped entirely, with no CSV
//! and no checkpoint entry, so they are re-examined on every run.

use snafu::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::{for_each_item, ItemOutcome, StageStats};
use crate::checkpoint::CheckpointLog;
use crate::config::Config;
use crate::error::{CheckpointSnafu, CreateOutputDirSnafu, PipelineError, ReaderSnafu, SinkSnafu};
use crate::sink::{CsvChunkWriter, WriteMode};
use crate::source::{discover, SqliteTableReader};

/// Dump every pending source database's table to a CSV file.
pub async fn run_dump(config: &Config) -> Result<StageStats, PipelineError> {
    let mut log =
        CheckpointLog::load(config.checkpoint.log_path("dump")).context(CheckpointSnafu)?;

    let items = discover(&config.source.db_dir, "db").context(ReaderSnafu)?;
    let pending: Vec<String> = log.pending(&items).iter().map(|s| s.to_string()).collect();
    info!(
        "dump: {} databases found, {} pending",
        items.len(),
        pending.len()
    );

    std::fs::create_dir_all(&config.source.csv_dir)
        .context(CreateOutputDirSnafu {
            path: &config.source.csv_dir,
        })
        .context(SinkSnafu)?;

    let table = config.source.table.clone();
    let csv_dir = config.source.csv_dir.clone();
    let chunk_size = config.limits.dump_chunk_size;
    let row_cap = config.limits.row_cap;

    let worker = Arc::new(move |item: &str| {
        dump_item(item, &table, &csv_dir, chunk_size, row_cap)
    });

    for_each_item(pending, config.limits.max_workers, &mut log, worker).await
}

/// Dump one database's table, if it is at or under the row cap.
fn dump_item(
    db_path: &str,
    table: &str,
    csv_dir: &str,
    chunk_size: usize,
    row_cap: usize,
) -> Result<ItemOutcome, PipelineError> {
    let reader = SqliteTableReader::open(db_path, table).context(ReaderSnafu)?;

    let row_count = reader.row_count().context(ReaderSnafu)?;
    if row_count > row_cap {
        return Ok(ItemOutcome::Skipped {
            reason: format!("{row_count} rows exceeds cap of {row_cap}"),
        });
    }

    let columns = reader.columns().context(ReaderSnafu)?;
    let csv_path = csv_output_path(db_path, csv_dir);
    info!("Dumping {} ({} rows) to {}", db_path, row_count, csv_path);

    let mut writer =
        CsvChunkWriter::open(&csv_path, &columns, WriteMode::Create).context(SinkSnafu)?;

    let mut rows_written = 0usize;
    let mut chunks_written = 0usize;
    reader.stream_chunks::<PipelineError, _>(chunk_size, |chunk| {
        rows_written += chunk.len();
        chunks_written += 1;
        writer.write_chunk(&chunk).context(SinkSnafu)
    })?;
    writer.finish().context(SinkSnafu)?;

    Ok(ItemOutcome::Processed {
        rows: rows_written,
        chunks: chunks_written,
    })
}

/// CSV output path: the database's file stem inside the CSV directory.
fn csv_output_path(db_path: &str, csv_dir: &str) -> String {
    let stem = Path::new(db_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    Path::new(csv_dir)
        .join(format!("{stem}.csv"))
        .to_string_lossy()
        .into_owned()
}
