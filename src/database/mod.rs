//! Database module
//!
//! This module provides all read access to the SQLite files being exported:
//!
//! - **core**: the query engine capability, its rusqlite implementation and the
//!   magic header check
//! - **access**: the locked-file access strategy that yields an [`AccessHandle`]
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── source      # TableSource capability, RawValue, ColumnInfo
//! │   ├── connection  # rusqlite DatabaseConn (implements TableSource)
//! │   └── validity    # "SQLite format 3\0" header check
//! │
//! └── access          # ReadOnly -> DirectOpen -> PrivateCopy fallback
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use sqlrescue::database::{AccessHandle, AccessOptions, TableSource};
//!
//! let handle = AccessHandle::acquire(path, &AccessOptions::default())?;
//! for table in handle.conn().list_tables()? {
//!     println!("{}: {} rows", table, handle.conn().row_count(&table)?);
//! }
//! handle.release();
//! ```

pub mod access;
pub mod core;

pub use access::{AccessHandle, AccessOptions, AccessTier};
pub use core::{
    is_valid_sqlite_database, quote_identifier, ColumnInfo, DatabaseConn, OpenMode, RawValue, Row,
    TableSource, SQLITE_MAGIC,
};
