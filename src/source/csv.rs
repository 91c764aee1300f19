//! Chunked CSV reader with encoding detection and malformed-row tolerance.
//!
//! The encoding is chosen from a bounded prefix of the file (with the
//! fallback retry from [`super::encoding`]); the rest of the file is
//! stream-decoded and parsed lazily into fixed-size row batches, so the
//! file is never held in memory whole. Rows with more fields than the
//! header are dropped; rows with fewer are padded with nulls, so every row
//! in a batch matches the header's arity.

use encoding_rs_io::DecodeReaderBytesBuilder;
use snafu::prelude::*;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use tracing::{debug, warn};

use super::encoding;
use super::Row;
use crate::error::{MissingHeaderSnafu, OpenSourceSnafu, ReaderError};

/// The sniffed prefix stitched back in front of the rest of the file,
/// decoded incrementally.
type DecodedFile =
    encoding_rs_io::DecodeReaderBytes<std::io::Chain<Cursor<Vec<u8>>, BufReader<File>>, Vec<u8>>;

/// A forward-only reader that yields row batches from one CSV file.
pub struct CsvChunkReader {
    path: String,
    header: Vec<String>,
    chunk_size: usize,
    records: csv::StringRecordsIntoIter<DecodedFile>,
    rows_skipped: usize,
}

impl CsvChunkReader {
    /// Open a CSV file, sniffing its encoding and reading the header row.
    pub fn open(path: &str, chunk_size: usize) -> Result<Self, ReaderError> {
        let file = File::open(path).context(OpenSourceSnafu { path })?;
        let mut file = BufReader::new(file);

        // Only the sniff window is read eagerly; it is chained back in
        // front of the remaining stream so nothing is read twice
        let mut prefix = vec![0u8; encoding::SNIFF_LEN];
        let mut filled = 0usize;
        loop {
            let n = file
                .read(&mut prefix[filled..])
                .context(OpenSourceSnafu { path })?;
            if n == 0 {
                break;
            }
            filled += n;
            if filled == prefix.len() {
                break;
            }
        }
        prefix.truncate(filled);

        let detected = encoding::select_encoding(&prefix, path)?;
        debug!("Reading {} as {}", path, detected.name());

        let decoded = DecodeReaderBytesBuilder::new()
            .encoding(Some(detected))
            .build(Cursor::new(prefix).chain(file));

        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded);

        let mut records = reader.into_records();
        let header = loop {
            match records.next() {
                Some(Ok(record)) => {
                    break record.iter().map(str::to_string).collect::<Vec<_>>();
                }
                Some(Err(e)) => {
                    debug!("Skipping unreadable header candidate in {}: {}", path, e);
                }
                None => return MissingHeaderSnafu { path }.fail(),
            }
        };

        Ok(Self {
            path: path.to_string(),
            header,
            chunk_size,
            records,
            rows_skipped: 0,
        })
    }

    /// The column list established by the first row of the file.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Rows dropped so far because they could not be parsed or had too
    /// many fields.
    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    /// Pull the next batch of up to `chunk_size` rows.
    ///
    /// Returns `Ok(None)` once the file is exhausted. The final batch may be
    /// shorter than `chunk_size`.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<Row>>, ReaderError> {
        let arity = self.header.len();
        let mut rows: Vec<Row> = Vec::with_capacity(self.chunk_size);

        while rows.len() < self.chunk_size {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    // Malformed row: skip and continue with the rest of the chunk
                    self.rows_skipped += 1;
                    debug!("Skipping malformed row in {}: {}", self.path, e);
                    continue;
                }
                None => break,
            };

            if record.len() > arity {
                self.rows_skipped += 1;
                continue;
            }

            let mut row: Row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect();
            row.resize(arity, None);
            rows.push(row);
        }

        if rows.is_empty() {
            if self.rows_skipped > 0 {
                warn!(
                    "Skipped {} malformed rows in {}",
                    self.rows_skipped, self.path
                );
            }
            return Ok(None);
        }
        Ok(Some(rows))
    }
}

/// Read the header and up to `n` data rows, for classification sampling.
pub fn read_sample(path: &str, n: usize) -> Result<(Vec<String>, Vec<Row>), ReaderError> {
    let mut reader = CsvChunkReader::open(path, n.max(1))?;
    let header = reader.header().to_vec();
    let rows = reader.next_chunk()?.unwrap_or_default();
    Ok((header, rows))
}

/// Number of columns in the file's header row. Reads only as far as the
/// first record.
pub fn probe_column_count(path: &str) -> Result<usize, ReaderError> {
    let reader = CsvChunkReader::open(path, 1)?;
    Ok(reader.header().len())
}
