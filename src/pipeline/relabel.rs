//! Relabel stage: in-place semantic renaming of source columns.
//!
//! Database sources go through the regex pattern classifier and get
//! `ALTER TABLE .. RENAME COLUMN` statements; CSV sources go through the
//! entity recognizers and are rewritten with positionally renamed name
//! columns (`name`, `name_1`, ...). Both kinds share one checkpoint log.

use snafu::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

use super::{for_each_item, ItemOutcome, StageStats};
use crate::checkpoint::CheckpointLog;
use crate::classify::{EntityClassifier, PatternClassifier};
use crate::config::Config;
use crate::error::{CheckpointSnafu, PipelineError, ReaderSnafu, SinkSnafu};
use crate::schema::rename_column;
use crate::sink::{CsvChunkWriter, WriteMode};
use crate::source::csv::read_sample;
use crate::source::{discover, CsvChunkReader, SqliteTableReader};

/// Relabel columns in every pending source database and CSV file.
pub async fn run_relabel(config: &Config) -> Result<StageStats, PipelineError> {
    let mut log =
        CheckpointLog::load(config.checkpoint.log_path("relabel")).context(CheckpointSnafu)?;

    let db_items = discover(&config.source.db_dir, "db").context(ReaderSnafu)?;
    let db_pending: Vec<String> = log
        .pending(&db_items)
        .iter()
        .map(|s| s.to_string())
        .collect();
    info!(
        "relabel: {} databases found, {} pending",
        db_items.len(),
        db_pending.len()
    );

    let table = config.source.table.clone();
    let classifier = PatternClassifier::new(config.limits.label_threshold);
    let sample_size = config.limits.sample_size;
    let worker =
        Arc::new(move |item: &str| relabel_db_item(item, &table, &classifier, sample_size));
    let mut stats = for_each_item(db_pending, config.limits.max_workers, &mut log, worker).await?;

    let csv_items = discover(&config.source.csv_dir, "csv").context(ReaderSnafu)?;
    let csv_pending: Vec<String> = log
        .pending(&csv_items)
        .iter()
        .map(|s| s.to_string())
        .collect();
    info!(
        "relabel: {} CSV files found, {} pending",
        csv_items.len(),
        csv_pending.len()
    );

    let sample_size = config.limits.sample_size;
    let chunk_size = config.limits.chunk_size;
    let worker = Arc::new(move |item: &str| relabel_csv_item(item, sample_size, chunk_size));
    let csv_stats =
        for_each_item(csv_pending, config.limits.max_workers, &mut log, worker).await?;

    stats.items_processed += csv_stats.items_processed;
    stats.items_skipped += csv_stats.items_skipped;
    stats.items_failed += csv_stats.items_failed;
    stats.rows_written += csv_stats.rows_written;
    stats.chunks_written += csv_stats.chunks_written;
    Ok(stats)
}

/// Classify each column of one database table and rename the labeled ones
/// in place.
fn relabel_db_item(
    db_path: &str,
    table: &str,
    classifier: &PatternClassifier,
    sample_size: usize,
) -> Result<ItemOutcome, PipelineError> {
    let reader = SqliteTableReader::open(db_path, table).context(ReaderSnafu)?;
    let columns = reader.columns().context(ReaderSnafu)?;

    let mut renames: Vec<(String, String)> = Vec::new();
    let mut taken: Vec<String> = columns.clone();
    for column in &columns {
        let sample = reader
            .sample_column(column, sample_size)
            .context(ReaderSnafu)?;
        let Some(label) = classifier.classify(sample.iter().map(String::as_str)) else {
            continue;
        };

        // Suffix until the new name collides with nothing already present
        // or already assigned
        let base = label.canonical_name();
        let mut candidate = base.to_string();
        let mut suffix = 0usize;
        while taken.iter().any(|c| c == &candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        taken.push(candidate.clone());
        renames.push((column.clone(), candidate));
    }
    drop(reader);

    if renames.is_empty() {
        return Ok(ItemOutcome::Skipped {
            reason: "no columns matched any pattern".to_string(),
        });
    }

    let conn = rusqlite::Connection::open(db_path)
        .context(crate::error::OpenDatabaseSnafu { path: db_path })
        .context(ReaderSnafu)?;
    for (old, new) in &renames {
        // A rejected rename (reserved word, concurrent change) loses that
        // column's label but must not abort the item
        match rename_column(&conn, table, old, new) {
            Ok(()) => info!("{}: renamed {} -> {}", db_path, old, new),
            Err(e) => warn!("{}: could not rename {}: {}", db_path, old, e),
        }
    }

    Ok(ItemOutcome::Processed {
        rows: 0,
        chunks: renames.len(),
    })
}

/// Detect name columns in one CSV via entity recognition and rewrite the
/// file with the positional renames applied.
fn relabel_csv_item(
    csv_path: &str,
    sample_size: usize,
    chunk_size: usize,
) -> Result<ItemOutcome, PipelineError> {
    let (header, sample) = read_sample(csv_path, sample_size).context(ReaderSnafu)?;

    let column_samples: Vec<Vec<String>> = (0..header.len())
        .map(|i| {
            sample
                .iter()
                .filter_map(|row| row.get(i).cloned().flatten())
                .collect()
        })
        .collect();

    let classifier = EntityClassifier::with_default_models();
    let renamed = classifier.rename_name_columns(&header, &column_samples);
    if renamed == header {
        return Ok(ItemOutcome::Skipped {
            reason: "no name columns detected".to_string(),
        });
    }
    info!("{}: {:?} -> {:?}", csv_path, header, renamed);

    // Rewrite through a sibling temp file so a crash mid-rewrite leaves the
    // original intact
    let tmp_path = format!("{csv_path}.tmp");
    let mut reader = CsvChunkReader::open(csv_path, chunk_size).context(ReaderSnafu)?;
    let mut writer =
        CsvChunkWriter::open(&tmp_path, &renamed, WriteMode::Create).context(SinkSnafu)?;

    let mut rows_written = 0usize;
    let mut chunks_written = 0usize;
    while let Some(chunk) = reader.next_chunk().context(ReaderSnafu)? {
        rows_written += chunk.len();
        chunks_written += 1;
        writer.write_chunk(&chunk).context(SinkSnafu)?;
    }
    writer.finish().context(SinkSnafu)?;

    std::fs::rename(&tmp_path, csv_path)
        .context(crate::error::OpenSourceSnafu { path: csv_path })
        .context(ReaderSnafu)?;

    Ok(ItemOutcome::Processed {
        rows: rows_written,
        chunks: chunks_written,
    })
}
