//! Error types for floe using snafu.
//!
//! This module defines structured error types with context selectors for
//! all error conditions in the codebase.

use snafu::prelude::*;
use std::path::PathBuf;

// ============ Checkpoint Errors ============

/// Errors that can occur while reading or appending the checkpoint log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CheckpointError {
    /// Failed to read an existing checkpoint log.
    #[snafu(display("Failed to read checkpoint log {}", path.display()))]
    ReadLog {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to open the checkpoint log for appending.
    #[snafu(display("Failed to open checkpoint log {}", path.display()))]
    OpenLog {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to append an entry to the checkpoint log.
    #[snafu(display("Failed to append to checkpoint log {}", path.display()))]
    AppendLog {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to create the checkpoint directory.
    #[snafu(display("Failed to create checkpoint directory {}", path.display()))]
    CreateDir {
        source: std::io::Error,
        path: PathBuf,
    },
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source database directory is empty.
    #[snafu(display("source.db_dir cannot be empty"))]
    EmptyDbDir,

    /// CSV exchange directory is empty.
    #[snafu(display("source.csv_dir cannot be empty"))]
    EmptyCsvDir,

    /// Sink path is empty.
    #[snafu(display("sink.path cannot be empty"))]
    EmptySinkPath,

    /// Chunk size must be non-zero.
    #[snafu(display("limits.chunk_size must be greater than zero"))]
    ZeroChunkSize,

    /// Worker count must be non-zero.
    #[snafu(display("limits.max_workers must be greater than zero"))]
    ZeroWorkers,

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Reader Errors ============

/// Errors that can occur while reading a source item.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReaderError {
    /// Failed to open a source file for reading.
    #[snafu(display("Failed to open source file {path}"))]
    OpenSource {
        source: std::io::Error,
        path: String,
    },

    /// Failed to list a source directory.
    #[snafu(display("Failed to list source directory {}", path.display()))]
    ListDir {
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to open a source database.
    #[snafu(display("Failed to open source database {path}"))]
    OpenDatabase {
        source: rusqlite::Error,
        path: String,
    },

    /// A query against the source database failed.
    #[snafu(display("Query failed on source database {path}"))]
    SourceQuery {
        source: rusqlite::Error,
        path: String,
    },

    /// Both the detected encoding and the fallback failed to decode the file.
    #[snafu(display("Failed to decode {path} with detected encoding {detected} or fallback"))]
    DecodeExhausted { path: String, detected: String },

    /// The CSV file had no header row.
    #[snafu(display("CSV file {path} has no header row"))]
    MissingHeader { path: String },

    /// A CSV parse error that prevents reading any further.
    #[snafu(display("Failed to parse CSV file {path}"))]
    CsvParse { source: csv::Error, path: String },
}

// ============ Schema Errors ============

/// Errors that can occur while evolving the destination schema.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    /// Failed to create the destination table.
    #[snafu(display("Failed to create table {table}"))]
    CreateTable {
        source: rusqlite::Error,
        table: String,
    },

    /// Failed to read the destination's column list.
    #[snafu(display("Failed to read columns of table {table}"))]
    ReadColumns {
        source: rusqlite::Error,
        table: String,
    },

    /// Failed to add a column to the destination table.
    #[snafu(display("Failed to add column {column} to table {table}"))]
    AddColumn {
        source: rusqlite::Error,
        table: String,
        column: String,
    },

    /// Failed to create the full-text search virtual table.
    #[snafu(display("Failed to create FTS table {table}"))]
    CreateFtsTable {
        source: rusqlite::Error,
        table: String,
    },

    /// Failed to rename a column in place.
    #[snafu(display("Failed to rename column {column} on table {table}"))]
    RenameColumn {
        source: rusqlite::Error,
        table: String,
        column: String,
    },
}

// ============ Sink Errors ============

/// Errors that can occur while writing chunks to a destination.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to open the destination database.
    #[snafu(display("Failed to open destination database {path}"))]
    OpenSink {
        source: rusqlite::Error,
        path: String,
    },

    /// Failed to create the CSV output file.
    #[snafu(display("Failed to create CSV output {path}"))]
    CreateCsv {
        source: std::io::Error,
        path: String,
    },

    /// Failed to create the CSV output directory.
    #[snafu(display("Failed to create output directory {path}"))]
    CreateOutputDir {
        source: std::io::Error,
        path: String,
    },

    /// Failed to write a row to the CSV output.
    #[snafu(display("Failed to write to CSV output {path}"))]
    WriteCsv { source: csv::Error, path: String },

    /// A batch insert into the destination table failed.
    #[snafu(display("Failed to insert batch into table {table}"))]
    InsertBatch {
        source: rusqlite::Error,
        table: String,
    },

    /// The incremental FTS index sync failed.
    #[snafu(display("Failed to sync FTS index {table}"))]
    FtsSync {
        source: rusqlite::Error,
        table: String,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level pipeline errors that aggregate all error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Checkpoint log error.
    #[snafu(display("Checkpoint error"))]
    Checkpoint { source: CheckpointError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Source reader error.
    #[snafu(display("Reader error"))]
    Reader { source: ReaderError },

    /// Schema reconciliation error.
    #[snafu(display("Schema error"))]
    Schema { source: SchemaError },

    /// Destination writer error.
    #[snafu(display("Sink error"))]
    Sink { source: SinkError },

    /// Task join error.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },
}

impl From<ReaderError> for PipelineError {
    fn from(source: ReaderError) -> Self {
        PipelineError::Reader { source }
    }
}

