//! Database connection management
//!
//! This module provides the rusqlite-backed [`TableSource`] used by the exporter.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use super::source::{quote_identifier, ColumnInfo, Row, RawValue, TableSource};
use crate::error::ExportResult;

/// How a database file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Strictly read-only; never requests a write lock
    ReadOnly,
    /// Default read/write semantics, without creating missing files
    ReadWrite,
}

impl OpenMode {
    fn flags(&self) -> OpenFlags {
        let mode = match self {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        };
        mode | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

/// Core database connection wrapper
///
/// `DatabaseConn` wraps a SQLite connection to a database file that belongs to
/// someone else: it is opened without creating anything, and every query it
/// issues is read-only.
pub struct DatabaseConn {
    pub conn: Connection,
    path: PathBuf,
}

impl DatabaseConn {
    /// Open a database file in the given mode
    ///
    /// `busy_timeout` bounds how long SQLite waits on a conflicting lock before
    /// reporting the database as busy. A zero timeout fails immediately.
    pub fn open(path: &Path, mode: OpenMode, busy_timeout: Duration) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(path, mode.flags())?;
        conn.busy_timeout(busy_timeout)?;
        Ok(DatabaseConn {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path the connection was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database can actually be read
    ///
    /// Opening a SQLite connection is lazy; locks and format errors only surface
    /// once the schema is read.
    pub fn probe_readable(&self) -> rusqlite::Result<()> {
        let _: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))?;
        Ok(())
    }

    /// Close the connection, reporting any error from SQLite
    pub fn close(self) -> rusqlite::Result<()> {
        self.conn.close().map_err(|(_, e)| e)
    }
}

impl TableSource for DatabaseConn {
    fn list_tables(&self) -> ExportResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    fn table_columns(&self, table: &str) -> ExportResult<Vec<ColumnInfo>> {
        let query = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut stmt = self.conn.prepare(&query)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    ordinal: row.get::<_, i64>(0)? as usize,
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn result_columns(&self, table: &str) -> ExportResult<Vec<String>> {
        let query = format!("SELECT * FROM {} LIMIT 0", quote_identifier(table));
        let stmt = self.conn.prepare(&query)?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    fn row_count(&self, table: &str) -> ExportResult<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = self.conn.query_row(&query, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn for_each_batch(
        &self,
        table: &str,
        row_limit: Option<u64>,
        batch_size: usize,
        visitor: &mut dyn FnMut(&[Row]) -> ExportResult<ControlFlow<()>>,
    ) -> ExportResult<()> {
        let mut query = format!("SELECT * FROM {}", quote_identifier(table));
        if let Some(limit) = row_limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&query)?;
        let column_count = stmt.column_count();
        let batch_size = batch_size.max(1);
        let mut rows = stmt.query([])?;
        let mut batch: Vec<Row> = Vec::with_capacity(batch_size);

        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                cells.push(RawValue::from(row.get_ref(idx)?));
            }
            batch.push(cells);

            if batch.len() >= batch_size {
                if visitor(&batch)?.is_break() {
                    return Ok(());
                }
                batch.clear();
            }
        }

        if !batch.is_empty() {
            visitor(&batch)?;
        }
        Ok(())
    }
}
