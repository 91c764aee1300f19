//! Migrate stage: CSV files into the consolidated store.
//!
//! Two destination shapes:
//! - **Semantic** (default): each file's header is classified from a sample
//!   and reconciled against the destination by name, with additive column
//!   evolution.
//! - **Fixed-width** (when `sink.fts_table` is set): every file maps
//!   positionally onto `col_1..col_N` (N = widest source, min 10), and the
//!   paired FTS5 index is synced after every chunk by rowid high-water mark.

use snafu::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{for_each_item, ItemOutcome, StageStats};
use crate::checkpoint::CheckpointLog;
use crate::classify::{positional_columns, rename_columns, PatternClassifier};
use crate::config::Config;
use crate::error::{CheckpointSnafu, PipelineError, ReaderSnafu, SchemaSnafu, SinkSnafu};
use crate::schema::{ensure_columns, ensure_fixed_width, ensure_table, MIN_FIXED_WIDTH};
use crate::sink::SqliteSink;
use crate::source::csv::{probe_column_count, read_sample};
use crate::source::{discover, CsvChunkReader, Row};

/// Migrate every pending CSV file into the consolidated store.
pub async fn run_migrate(config: &Config) -> Result<StageStats, PipelineError> {
    let mut log =
        CheckpointLog::load(config.checkpoint.log_path("migrate")).context(CheckpointSnafu)?;

    let items = discover(&config.source.csv_dir, "csv").context(ReaderSnafu)?;
    let pending: Vec<String> = log.pending(&items).iter().map(|s| s.to_string()).collect();
    info!(
        "migrate: {} CSV files found, {} pending",
        items.len(),
        pending.len()
    );

    let sink_path = config.sink.path.clone();
    let sink_table = config.sink.table.clone();
    let chunk_size = config.limits.chunk_size;

    if let Some(fts_table) = config.sink.fts_table.clone() {
        // Fixed-width path: the destination shape is declared up front from
        // the widest source, and all DDL happens here, before fan-out.
        let width = max_column_width(&items);
        info!("migrate: fixed-width schema, {} columns", width);

        let sink = SqliteSink::open(&sink_path, &sink_table).context(SinkSnafu)?;
        ensure_fixed_width(sink.conn(), &sink_table, &fts_table, width).context(SchemaSnafu)?;
        drop(sink);

        let worker = Arc::new(move |item: &str| {
            migrate_item_fixed(item, &sink_path, &sink_table, &fts_table, width, chunk_size)
        });
        return for_each_item(pending, config.limits.max_workers, &mut log, worker).await;
    }

    let classifier = PatternClassifier::new(config.limits.label_threshold);
    let sample_size = config.limits.sample_size;
    let worker = Arc::new(move |item: &str| {
        migrate_item(
            item,
            &sink_path,
            &sink_table,
            &classifier,
            sample_size,
            chunk_size,
        )
    });
    for_each_item(pending, config.limits.max_workers, &mut log, worker).await
}

/// Migrate one CSV into the semantic destination shape.
fn migrate_item(
    csv_path: &str,
    sink_path: &str,
    sink_table: &str,
    classifier: &PatternClassifier,
    sample_size: usize,
    chunk_size: usize,
) -> Result<ItemOutcome, PipelineError> {
    // Classify once per item from a bounded sample, then apply the rename
    // plan to every chunk of the file.
    let (header, sample) = read_sample(csv_path, sample_size).context(ReaderSnafu)?;
    let labels: Vec<_> = (0..header.len())
        .map(|i| {
            classifier.classify(
                sample
                    .iter()
                    .filter_map(|row| row.get(i).and_then(Option::as_deref)),
            )
        })
        .collect();
    let dest_columns = rename_columns(&header, &labels);
    if dest_columns != header {
        info!("Classified {}: {:?} -> {:?}", csv_path, header, dest_columns);
    }

    let mut reader = CsvChunkReader::open(csv_path, chunk_size).context(ReaderSnafu)?;
    let mut sink = SqliteSink::open(sink_path, sink_table).context(SinkSnafu)?;
    ensure_table(sink.conn(), sink_table, &dest_columns).context(SchemaSnafu)?;

    let mut rows_written = 0usize;
    let mut chunks_written = 0usize;
    while let Some(chunk) = reader.next_chunk().context(ReaderSnafu)? {
        // Re-reconcile per chunk: another worker may have evolved the
        // destination since our last write
        ensure_columns(sink.conn(), sink_table, &dest_columns).context(SchemaSnafu)?;
        rows_written += sink.insert_chunk(&dest_columns, &chunk).context(SinkSnafu)?;
        chunks_written += 1;
        debug!("{}: chunk {} written", csv_path, chunks_written);
    }

    Ok(ItemOutcome::Processed {
        rows: rows_written,
        chunks: chunks_written,
    })
}

/// Migrate one CSV into the fixed-width destination shape, syncing the FTS
/// index after every chunk.
fn migrate_item_fixed(
    csv_path: &str,
    sink_path: &str,
    sink_table: &str,
    fts_table: &str,
    width: usize,
    chunk_size: usize,
) -> Result<ItemOutcome, PipelineError> {
    let columns = positional_columns(width);
    let mut reader = CsvChunkReader::open(csv_path, chunk_size).context(ReaderSnafu)?;
    let mut sink = SqliteSink::open(sink_path, sink_table).context(SinkSnafu)?;

    let mut rows_written = 0usize;
    let mut chunks_written = 0usize;
    while let Some(mut chunk) = reader.next_chunk().context(ReaderSnafu)? {
        for row in &mut chunk {
            pad_row(row, width);
        }
        rows_written += sink.insert_chunk(&columns, &chunk).context(SinkSnafu)?;
        chunks_written += 1;
        sink.sync_fts(fts_table, &columns).context(SinkSnafu)?;
    }

    Ok(ItemOutcome::Processed {
        rows: rows_written,
        chunks: chunks_written,
    })
}

/// Pad a row with nulls up to the fixed width.
fn pad_row(row: &mut Row, width: usize) {
    if row.len() < width {
        row.resize(width, None);
    }
}

/// Widest header across all CSV files, floor [`MIN_FIXED_WIDTH`].
///
/// Unreadable files are left out of the probe; they will surface again as
/// item-level failures when actually migrated.
fn max_column_width(items: &[String]) -> usize {
    let mut width = MIN_FIXED_WIDTH;
    for item in items {
        match probe_column_count(item) {
            Ok(count) => width = width.max(count),
            Err(e) => warn!("Could not probe {}: {}", item, e),
        }
    }
    width
}
