//! Source discovery and chunked readers.
//!
//! Provides a unified row representation for both source kinds (SQLite
//! tables and delimited text files) plus non-recursive directory discovery.

pub mod csv;
pub mod encoding;
pub mod sqlite;

pub use csv::CsvChunkReader;
pub use sqlite::SqliteTableReader;

use snafu::prelude::*;
use std::path::Path;

use crate::error::{ListDirSnafu, ReaderError};

/// One row of a chunk. `None` is a null/missing value.
pub type Row = Vec<Option<String>>;

/// List source files with the given extension, non-recursively, sorted.
///
/// Sorting keeps discovery order deterministic; processing order within a
/// run still depends on worker scheduling.
pub fn discover(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<String>, ReaderError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).context(ListDirSnafu { path: dir })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.context(ListDirSnafu { path: dir })?;
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            files.push(path.to_string_lossy().into_owned());
        }
    }
    files.sort();
    Ok(files)
}
