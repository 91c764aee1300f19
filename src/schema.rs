//! Destination schema inference and reconciliation.
//!
//! The destination schema only ever grows: columns are added as generic
//! TEXT, never dropped, renamed or retyped. Two shapes are supported:
//! a semantic shape (incoming column names, evolved additively) and a
//! fixed-width positional shape (`col_1..col_N`) used by the FTS path.

use rusqlite::Connection;
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::classify::positional_columns;
use crate::error::{
    AddColumnSnafu, CreateFtsTableSnafu, CreateTableSnafu, ReadColumnsSnafu, RenameColumnSnafu,
    SchemaError,
};
use crate::source::sqlite::quote_ident;

/// Minimum width of the fixed positional schema.
pub const MIN_FIXED_WIDTH: usize = 10;

/// Live column list of a destination table, in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, SchemaError> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql).context(ReadColumnsSnafu { table })?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context(ReadColumnsSnafu { table })?
        .collect::<Result<Vec<_>, _>>()
        .context(ReadColumnsSnafu { table })?;
    Ok(columns)
}

/// Whether a table exists in the destination.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, SchemaError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .context(ReadColumnsSnafu { table })?;
    Ok(count > 0)
}

/// Create the destination table on first contact: an auto-assigned numeric
/// row identifier plus the incoming columns as TEXT. A no-op if the table
/// already exists.
pub fn ensure_table(conn: &Connection, table: &str, columns: &[String]) -> Result<(), SchemaError> {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        quote_ident(table),
        column_defs.join(", ")
    );
    conn.execute(&sql, []).context(CreateTableSnafu { table })?;
    Ok(())
}

/// Reconcile incoming column names against the destination: every incoming
/// name absent from the live column list gets an additive TEXT column.
///
/// A rejection because the column already exists (e.g. a concurrent worker
/// added it between our read and our ALTER) is logged and treated as a
/// no-op; any other engine error propagates.
pub fn ensure_columns(
    conn: &Connection,
    table: &str,
    incoming: &[String],
) -> Result<(), SchemaError> {
    let existing = table_columns(conn, table)?;
    for column in incoming {
        if existing.iter().any(|c| c == column) {
            continue;
        }
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            quote_ident(table),
            quote_ident(column)
        );
        match conn.execute(&sql, []) {
            Ok(_) => debug!("Added column {} to {}", column, table),
            Err(e) if e.to_string().contains("duplicate column name") => {
                warn!("Column {} already exists on {}, continuing", column, table);
            }
            Err(e) => return Err(e).context(AddColumnSnafu { table, column }),
        }
    }
    Ok(())
}

/// Create the fixed-width positional table and its paired FTS5 index.
///
/// The FTS table is an external-content index over the primary table,
/// keyed by the primary table's row identifier.
pub fn ensure_fixed_width(
    conn: &Connection,
    table: &str,
    fts_table: &str,
    width: usize,
) -> Result<(), SchemaError> {
    let columns = positional_columns(width);
    ensure_table(conn, table, &columns)?;

    let fts_columns: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let sql = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5({}, content='{}', content_rowid='id')",
        quote_ident(fts_table),
        fts_columns.join(", "),
        table
    );
    conn.execute(&sql, [])
        .context(CreateFtsTableSnafu { table: fts_table })?;
    Ok(())
}

/// Rename one column in place.
pub fn rename_column(
    conn: &Connection,
    table: &str,
    old: &str,
    new: &str,
) -> Result<(), SchemaError> {
    let sql = format!(
        "ALTER TABLE {} RENAME COLUMN {} TO {}",
        quote_ident(table),
        quote_ident(old),
        quote_ident(new)
    );
    conn.execute(&sql, []).context(RenameColumnSnafu {
        table,
        column: old,
    })?;
    Ok(())
}
