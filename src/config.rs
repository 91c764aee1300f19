//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files and exposing the fixed
//! tuning surface of the pipeline (chunk sizes, row cap, classifier
//! thresholds, worker count).

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{
    ConfigError, EmptyCsvDirSnafu, EmptyDbDirSnafu, EmptySinkPathSnafu, ReadFileSnafu,
    YamlParseSnafu, ZeroChunkSizeSnafu, ZeroWorkersSnafu,
};

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    /// Checkpoint log location (optional, defaults to ./checkpoints).
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Tuning limits (optional, all defaulted).
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Source configuration for input discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory scanned (non-recursively) for source database files.
    pub db_dir: String,

    /// Table read from each source database.
    #[serde(default = "default_source_table")]
    pub table: String,

    /// CSV exchange directory: dump output and migrate input.
    pub csv_dir: String,
}

fn default_source_table() -> String {
    "main".to_string()
}

/// Sink configuration for the consolidated store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Path to the consolidated SQLite database.
    pub path: String,

    /// Destination table name.
    #[serde(default = "default_sink_table")]
    pub table: String,

    /// Paired FTS5 virtual table. When set, migration uses the fixed-width
    /// positional schema (col_1..col_N) and keeps this index in sync.
    #[serde(default)]
    pub fts_table: Option<String>,
}

fn default_sink_table() -> String {
    "data".to_string()
}

/// Checkpoint log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding one append-only log per stage.
    #[serde(default = "default_checkpoint_path")]
    pub path: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
        }
    }
}

fn default_checkpoint_path() -> String {
    "./checkpoints".to_string()
}

impl CheckpointConfig {
    /// Log file for a given stage, inside the checkpoint directory.
    pub fn log_path(&self, stage: &str) -> PathBuf {
        Path::new(&self.path).join(format!("{stage}.log"))
    }
}

/// Tuning limits for chunking, gating and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Rows per batch when migrating CSVs into the store (default: 5000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Rows per batch when dumping a source table to CSV (default: 3000).
    #[serde(default = "default_dump_chunk_size")]
    pub dump_chunk_size: usize,

    /// Source tables with more rows than this are skipped by the dump stage
    /// (default: 200000).
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,

    /// Rows sampled per column for classification (default: 100).
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// A label is assigned only when its hit count strictly exceeds this
    /// (default: 50).
    #[serde(default = "default_label_threshold")]
    pub label_threshold: usize,

    /// Fixed-size worker pool for item fan-out (default: min(cores, 4)).
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            dump_chunk_size: default_dump_chunk_size(),
            row_cap: default_row_cap(),
            sample_size: default_sample_size(),
            label_threshold: default_label_threshold(),
            max_workers: default_max_workers(),
        }
    }
}

fn default_chunk_size() -> usize {
    5000
}

fn default_dump_chunk_size() -> usize {
    3000
}

fn default_row_cap() -> usize {
    200_000
}

fn default_sample_size() -> usize {
    100
}

fn default_label_threshold() -> usize {
    50
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(1)
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.db_dir.is_empty(), EmptyDbDirSnafu);
        ensure!(!self.source.csv_dir.is_empty(), EmptyCsvDirSnafu);
        ensure!(!self.sink.path.is_empty(), EmptySinkPathSnafu);
        ensure!(self.limits.chunk_size > 0, ZeroChunkSizeSnafu);
        ensure!(self.limits.dump_chunk_size > 0, ZeroChunkSizeSnafu);
        ensure!(self.limits.max_workers > 0, ZeroWorkersSnafu);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_yaml_parsing() {
        let yaml = r#"
source:
  db_dir: ./db
  csv_dir: ./csv_output
  table: main

sink:
  path: ./metadata.db
  table: data

limits:
  chunk_size: 1000
  label_threshold: 10
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source.table, "main");
        assert_eq!(config.limits.chunk_size, 1000);
        assert_eq!(config.limits.label_threshold, 10);
        // Untouched fields keep their defaults
        assert_eq!(config.limits.dump_chunk_size, 3000);
        assert_eq!(config.limits.row_cap, 200_000);
        assert!(config.sink.fts_table.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let yaml = r#"
source:
  db_dir: ./db
  csv_dir: ./csv

sink:
  path: ./out.db
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sink.table, "data");
        assert_eq!(config.limits.sample_size, 100);
        assert_eq!(config.checkpoint.path, "./checkpoints");
        assert!(config.limits.max_workers >= 1);
    }

    #[test]
    fn test_stage_log_path() {
        let checkpoint = CheckpointConfig {
            path: "/tmp/ckpt".to_string(),
        };
        assert_eq!(
            checkpoint.log_path("dump"),
            PathBuf::from("/tmp/ckpt/dump.log")
        );
    }
}
