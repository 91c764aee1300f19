//! floe: a checkpointed batch pipeline for consolidating SQLite databases.
//!
//! This library provides components for dumping oversized-database tables
//! to CSV, classifying column semantics from sampled values, and migrating
//! the results into a single evolvable SQLite store, optionally paired with
//! an incrementally synced FTS5 index. Every stage checkpoints finished
//! items to an append-only log so repeated runs skip completed inputs.
//!
//! # Example
//!
//! ```ignore
//! use floe::{Config, error::PipelineError, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let stats = pipeline::run_migrate(&config).await?;
//!     println!("Migrated {} rows", stats.rows_written);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod source;

// Re-export main types
pub use checkpoint::CheckpointLog;
pub use config::Config;
pub use pipeline::{run_dump, run_migrate, run_relabel, StageStats};
