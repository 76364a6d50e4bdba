//! Core database infrastructure
//!
//! This module provides the foundational database components used by the exporter:
//! - `TableSource`: the query engine capability the export pipeline relies on
//! - `DatabaseConn`: rusqlite implementation of `TableSource`
//! - `is_valid_sqlite_database`: magic header check performed before any open

mod connection;
mod source;
mod validity;

pub use connection::{DatabaseConn, OpenMode};
pub use source::{quote_identifier, ColumnInfo, RawValue, Row, TableSource};
pub use validity::{is_valid_sqlite_database, SQLITE_MAGIC};
