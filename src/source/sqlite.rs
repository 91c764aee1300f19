//! Chunked reader for a table in a source SQLite database.
//!
//! Issues one full-table query and drains it in fixed-size batches so large
//! tables never sit in memory whole. Row order is the engine's natural scan
//! order; it is not guaranteed stable across runs.

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use snafu::prelude::*;

use super::Row;
use crate::error::{OpenDatabaseSnafu, ReaderError, SourceQuerySnafu};

/// A reader over one table of one source database.
pub struct SqliteTableReader {
    conn: Connection,
    path: String,
    table: String,
}

impl SqliteTableReader {
    /// Open a source database read-only.
    pub fn open(path: &str, table: &str) -> Result<Self, ReaderError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context(OpenDatabaseSnafu { path })?;

        Ok(Self {
            conn,
            path: path.to_string(),
            table: table.to_string(),
        })
    }

    /// Total rows in the source table.
    pub fn row_count(&self) -> Result<usize, ReaderError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .context(SourceQuerySnafu { path: &self.path })?;
        Ok(count as usize)
    }

    /// Column names of the source table, in declaration order.
    pub fn columns(&self) -> Result<Vec<String>, ReaderError> {
        let sql = format!("SELECT * FROM {} LIMIT 0", quote_ident(&self.table));
        let stmt = self
            .conn
            .prepare(&sql)
            .context(SourceQuerySnafu { path: &self.path })?;
        Ok(stmt.column_names().iter().map(|c| c.to_string()).collect())
    }

    /// First `n` values of one column, as display strings, for sampling.
    pub fn sample_column(&self, column: &str, n: usize) -> Result<Vec<String>, ReaderError> {
        let sql = format!(
            "SELECT {} FROM {} LIMIT {}",
            quote_ident(column),
            quote_ident(&self.table),
            n
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context(SourceQuerySnafu { path: &self.path })?;
        let mut rows = stmt
            .query([])
            .context(SourceQuerySnafu { path: &self.path })?;

        let mut values = Vec::new();
        while let Some(row) = rows.next().context(SourceQuerySnafu { path: &self.path })? {
            if let Some(value) = value_to_string(row.get_ref(0).context(SourceQuerySnafu {
                path: &self.path,
            })?) {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Stream the whole table through `on_chunk` in batches of `chunk_size`.
    ///
    /// The callback receives each batch in production order; batch K is fully
    /// read before batch K+1 begins. The callback's error aborts the scan.
    pub fn stream_chunks<E, F>(&self, chunk_size: usize, mut on_chunk: F) -> Result<(), E>
    where
        E: From<ReaderError>,
        F: FnMut(Vec<Row>) -> Result<(), E>,
    {
        let sql = format!("SELECT * FROM {}", quote_ident(&self.table));
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context(SourceQuerySnafu { path: &self.path })
            .map_err(E::from)?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query([])
            .context(SourceQuerySnafu { path: &self.path })
            .map_err(E::from)?;

        let mut batch: Vec<Row> = Vec::with_capacity(chunk_size);
        loop {
            let next = rows
                .next()
                .context(SourceQuerySnafu { path: &self.path })
                .map_err(E::from)?;
            match next {
                Some(row) => {
                    let mut out: Row = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        let value = row
                            .get_ref(i)
                            .context(SourceQuerySnafu { path: &self.path })
                            .map_err(E::from)?;
                        out.push(value_to_string(value));
                    }
                    batch.push(out);
                    if batch.len() == chunk_size {
                        on_chunk(std::mem::replace(
                            &mut batch,
                            Vec::with_capacity(chunk_size),
                        ))?;
                    }
                }
                None => break,
            }
        }
        if !batch.is_empty() {
            on_chunk(batch)?;
        }
        Ok(())
    }
}

/// Render any SQLite value as an optional display string.
fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Quote an identifier for embedding in SQL.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_db(path: &str, rows: usize) {
        let conn = Connection::open(path).unwrap();
        conn.execute("CREATE TABLE main (a TEXT, b TEXT)", [])
            .unwrap();
        let mut stmt = conn
            .prepare("INSERT INTO main (a, b) VALUES (?1, ?2)")
            .unwrap();
        for i in 0..rows {
            stmt.execute(rusqlite::params![format!("a{i}"), format!("b{i}")])
                .unwrap();
        }
    }

    #[test]
    fn test_row_count_and_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("src.db");
        let path = path.to_str().unwrap();
        seed_db(path, 7);

        let reader = SqliteTableReader::open(path, "main").unwrap();
        assert_eq!(reader.row_count().unwrap(), 7);
        assert_eq!(reader.columns().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_stream_chunks_covers_all_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("src.db");
        let path = path.to_str().unwrap();
        seed_db(path, 10);

        let reader = SqliteTableReader::open(path, "main").unwrap();
        let mut sizes = Vec::new();
        let mut total = 0usize;
        reader
            .stream_chunks::<ReaderError, _>(4, |chunk| {
                sizes.push(chunk.len());
                total += chunk.len();
                Ok(())
            })
            .unwrap();

        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(total, 10);
    }

    #[test]
    fn test_sample_column_skips_nulls() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("src.db");
        let path = path.to_str().unwrap();

        let conn = Connection::open(path).unwrap();
        conn.execute("CREATE TABLE main (a TEXT)", []).unwrap();
        conn.execute("INSERT INTO main (a) VALUES ('x'), (NULL), ('y')", [])
            .unwrap();
        drop(conn);

        let reader = SqliteTableReader::open(path, "main").unwrap();
        let sample = reader.sample_column("a", 10).unwrap();
        assert_eq!(sample, vec!["x", "y"]);
    }

    #[test]
    fn test_open_missing_database() {
        assert!(SqliteTableReader::open("/no/such/dir/x.db", "main").is_err());
    }
}
