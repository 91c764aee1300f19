//! Pipeline stages and the item fan-out driver.
//!
//! Each stage enumerates its source items, filters them through the stage's
//! checkpoint log, and dispatches the survivors across a fixed-size worker
//! pool. One worker owns one item end-to-end: its chunk loop runs
//! synchronously top to bottom, with its own destination connection, so
//! create-vs-append ordering within an item can never race.
//!
//! Item failures are contained: a failed item is logged, left out of the
//! checkpoint (it will be retried next run), and the stage moves on. There
//! is no global abort.

mod dump;
mod migrate;
mod relabel;

pub use dump::run_dump;
pub use migrate::run_migrate;
pub use relabel::run_relabel;

use futures::stream::{FuturesUnordered, StreamExt};
use snafu::prelude::*;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointLog;
use crate::error::{CheckpointSnafu, PipelineError, TaskJoinSnafu};

/// Statistics about one stage run.
#[derive(Debug, Clone, Default)]
pub struct StageStats {
    pub items_processed: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub rows_written: usize,
    pub chunks_written: usize,
}

/// Outcome of processing one source item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// The item was read and written in full.
    Processed { rows: usize, chunks: usize },
    /// The item was examined and deliberately not processed (e.g. over the
    /// row cap). Skipped items are not checkpointed.
    Skipped { reason: String },
}

type ItemHandle = JoinHandle<(String, Result<ItemOutcome, PipelineError>)>;

/// Run `worker` over every pending item with at most `max_workers` in
/// flight, marking successful items done as they complete.
///
/// Workers run on the blocking thread pool; the next item starts as soon
/// as a slot frees up. The checkpoint log is appended from this driver, so
/// log writes are one-at-a-time even though items complete concurrently.
pub(crate) async fn for_each_item<F>(
    pending: Vec<String>,
    max_workers: usize,
    log: &mut CheckpointLog,
    worker: Arc<F>,
) -> Result<StageStats, PipelineError>
where
    F: Fn(&str) -> Result<ItemOutcome, PipelineError> + Send + Sync + 'static,
{
    let mut stats = StageStats::default();
    let mut in_flight: FuturesUnordered<ItemHandle> = FuturesUnordered::new();
    let mut items = pending.into_iter();

    let spawn = |item: String, worker: Arc<F>| -> ItemHandle {
        tokio::task::spawn_blocking(move || {
            let result = worker(&item);
            (item, result)
        })
    };

    for item in items.by_ref().take(max_workers) {
        debug!("Starting item {}", item);
        in_flight.push(spawn(item, worker.clone()));
    }

    while let Some(joined) = in_flight.next().await {
        let (item, result) = joined.context(TaskJoinSnafu)?;
        match result {
            Ok(ItemOutcome::Processed { rows, chunks }) => {
                log.mark_done(&item).context(CheckpointSnafu)?;
                stats.items_processed += 1;
                stats.rows_written += rows;
                stats.chunks_written += chunks;
                info!("Finished {} ({} rows, {} chunks)", item, rows, chunks);
            }
            Ok(ItemOutcome::Skipped { reason }) => {
                stats.items_skipped += 1;
                info!("Skipping {}: {}", item, reason);
            }
            Err(e) => {
                stats.items_failed += 1;
                warn!("Item {} failed, will retry next run: {}", item, e);
            }
        }

        if let Some(next) = items.next() {
            debug!("Starting item {}", next);
            in_flight.push(spawn(next, worker.clone()));
        }
    }

    Ok(stats)
}
