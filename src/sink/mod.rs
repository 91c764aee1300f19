//! Chunk writers for CSV and SQLite destinations.

pub mod csv;
pub mod sqlite;

pub use csv::CsvChunkWriter;
pub use sqlite::SqliteSink;

/// Whether a write is the first for its destination (header/DDL) or a
/// continuation (rows only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Append,
}
