//! SQLite chunk writer with incremental FTS sync.
//!
//! Each batch is inserted inside one transaction, projected into the
//! incoming column order; columns the destination has but the batch lacks
//! are left NULL by the engine. Inserts are append-only with no upsert, so
//! replaying an item that was never checkpointed duplicates its rows.
//!
//! Every worker owns its own sink (and therefore its own connection); the
//! connection is never shared across worker boundaries.

use rusqlite::{params_from_iter, Connection};
use snafu::prelude::*;
use std::time::Duration;
use tracing::debug;

use crate::error::{FtsSyncSnafu, InsertBatchSnafu, OpenSinkSnafu, SinkError};
use crate::source::sqlite::quote_ident;
use crate::source::Row;

/// A writer over one destination table in the consolidated store.
pub struct SqliteSink {
    conn: Connection,
    table: String,
}

impl SqliteSink {
    /// Open (or create) the consolidated store.
    pub fn open(path: &str, table: &str) -> Result<Self, SinkError> {
        let conn = Connection::open(path).context(OpenSinkSnafu { path })?;
        // Concurrent workers contend on the single store file
        conn.busy_timeout(Duration::from_secs(30))
            .context(OpenSinkSnafu { path })?;

        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    /// The underlying connection, for schema reconciliation.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Bulk-append one batch under the given column names, in one
    /// transaction. Returns the number of rows inserted.
    pub fn insert_chunk(&mut self, columns: &[String], rows: &[Row]) -> Result<usize, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            column_list.join(", "),
            placeholders.join(", ")
        );

        let table = self.table.clone();
        let tx = self
            .conn
            .transaction()
            .context(InsertBatchSnafu { table: &table })?;
        {
            let mut stmt = tx.prepare(&sql).context(InsertBatchSnafu { table: &table })?;
            for row in rows {
                // Project to the declared arity: extra fields dropped,
                // missing fields inserted as NULL
                let values = (0..columns.len()).map(|i| row.get(i).and_then(Option::as_deref));
                stmt.execute(params_from_iter(values))
                    .context(InsertBatchSnafu { table: &table })?;
            }
        }
        tx.commit().context(InsertBatchSnafu { table: &table })?;

        debug!("Inserted {} rows into {}", rows.len(), self.table);
        Ok(rows.len())
    }

    /// Incrementally sync the paired FTS index: pull every row of the
    /// primary table with an identifier above the index's current
    /// high-water mark. Returns the number of rows indexed.
    pub fn sync_fts(&self, fts_table: &str, columns: &[String]) -> Result<usize, SinkError> {
        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let column_list = column_list.join(", ");
        let sql = format!(
            "INSERT INTO {fts} (rowid, {cols}) \
             SELECT id, {cols} FROM {table} \
             WHERE id > (SELECT IFNULL(MAX(rowid), 0) FROM {fts})",
            fts = quote_ident(fts_table),
            cols = column_list,
            table = quote_ident(&self.table),
        );
        let indexed = self
            .conn
            .execute(&sql, [])
            .context(FtsSyncSnafu { table: fts_table })?;
        debug!("Indexed {} rows into {}", indexed, fts_table);
        Ok(indexed)
    }
}
