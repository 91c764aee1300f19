//! CSV chunk writer.
//!
//! Create mode writes the header row then data; append mode reopens the
//! file and writes data only. One writer per destination file per worker;
//! the header-then-data ordering is kept safe by never sharing a file
//! handle across workers.

use snafu::prelude::*;
use std::fs::{File, OpenOptions};
use tracing::debug;

use super::WriteMode;
use crate::error::{CreateCsvSnafu, SinkError, WriteCsvSnafu};
use crate::source::Row;

/// Appends row batches to one CSV output file.
pub struct CsvChunkWriter {
    path: String,
    writer: csv::Writer<File>,
}

impl CsvChunkWriter {
    /// Open the destination. Create mode truncates and writes the header;
    /// append mode assumes the header already exists.
    pub fn open(path: &str, header: &[String], mode: WriteMode) -> Result<Self, SinkError> {
        let file = match mode {
            WriteMode::Create => File::create(path).context(CreateCsvSnafu { path })?,
            WriteMode::Append => OpenOptions::new()
                .append(true)
                .open(path)
                .context(CreateCsvSnafu { path })?,
        };
        let mut writer = csv::Writer::from_writer(file);

        if mode == WriteMode::Create {
            writer.write_record(header).context(WriteCsvSnafu { path })?;
            debug!("Created {} with {} columns", path, header.len());
        }

        Ok(Self {
            path: path.to_string(),
            writer,
        })
    }

    /// Append one batch of rows.
    pub fn write_chunk(&mut self, rows: &[Row]) -> Result<(), SinkError> {
        for row in rows {
            let record = row.iter().map(|v| v.as_deref().unwrap_or(""));
            self.writer
                .write_record(record)
                .context(WriteCsvSnafu { path: &self.path })?;
        }
        Ok(())
    }

    /// Flush buffered rows to disk.
    pub fn finish(mut self) -> Result<(), SinkError> {
        self.writer
            .flush()
            .map_err(csv::Error::from)
            .context(WriteCsvSnafu { path: &self.path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(values: &[&str]) -> Row {
        values
            .iter()
            .map(|v| {
                if v.is_empty() {
                    None
                } else {
                    Some(v.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn test_create_then_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let path = path.to_str().unwrap();
        let header = vec!["a".to_string(), "b".to_string()];

        let mut writer = CsvChunkWriter::open(path, &header, WriteMode::Create).unwrap();
        writer.write_chunk(&[row(&["1", "2"])]).unwrap();
        writer.finish().unwrap();

        let mut writer = CsvChunkWriter::open(path, &header, WriteMode::Append).unwrap();
        writer.write_chunk(&[row(&["3", "4"])]).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn test_nulls_become_empty_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let path = path.to_str().unwrap();
        let header = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let mut writer = CsvChunkWriter::open(path, &header, WriteMode::Create).unwrap();
        writer.write_chunk(&[row(&["x", "", "z"])]).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content, "a,b,c\nx,,z\n");
    }
}
