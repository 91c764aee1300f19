//! Append-only checkpoint log for whole-item resumption.
//!
//! Each stage keeps a plain text log of finished item paths, one per line.
//! At startup the log is rehydrated into an in-memory set; membership decides
//! whether an item is skipped on later runs. Appends happen through a single
//! write call per entry so concurrent workers can share the log file safely.
//!
//! Granularity is deliberately coarse: an entry means "this item finished",
//! nothing less. A crash after some chunks are written but before the entry
//! lands makes the next run reprocess the whole item.

use snafu::prelude::*;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{AppendLogSnafu, CheckpointError, CreateDirSnafu, OpenLogSnafu, ReadLogSnafu};

/// An append-only set of finished item identifiers backed by a text file.
#[derive(Debug)]
pub struct CheckpointLog {
    path: PathBuf,
    done: HashSet<String>,
}

impl CheckpointLog {
    /// Load the log from disk. A missing file is a cold start, not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
            }
        }

        let done = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e).context(ReadLogSnafu { path: &path }),
        };

        debug!("Loaded {} checkpoint entries from {:?}", done.len(), path);
        Ok(Self { path, done })
    }

    /// Whether an item has already been processed.
    pub fn is_done(&self, item: &str) -> bool {
        self.done.contains(item)
    }

    /// Record an item as finished.
    ///
    /// The entry is appended with one write call and flushed before the
    /// in-memory set is updated. Entries are never deduplicated or removed.
    pub fn mark_done(&mut self, item: &str) -> Result<(), CheckpointError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context(OpenLogSnafu { path: &self.path })?;

        let line = format!("{item}\n");
        file.write_all(line.as_bytes())
            .context(AppendLogSnafu { path: &self.path })?;
        file.flush().context(AppendLogSnafu { path: &self.path })?;

        self.done.insert(item.to_string());
        Ok(())
    }

    /// Number of finished items.
    pub fn len(&self) -> usize {
        self.done.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Filter a list of discovered items down to those not yet done.
    pub fn pending<'a>(&self, items: &'a [String]) -> Vec<&'a str> {
        items
            .iter()
            .filter(|i| !self.is_done(i))
            .map(String::as_str)
            .collect()
    }
}
