//! Error types for sqlrescue
//!
//! The export pipeline distinguishes failures by the granularity at which they
//! are absorbed:
//! - per file: [`ExportError::NotADatabase`] (a skip) and [`ExportError::Access`]
//! - per table: [`ExportError::TableExport`]
//! - per run: [`ExportError::Fatal`] and [`ExportError::Io`]
//!
//! Timestamp classification never fails; a cell that cannot be interpreted
//! degrades to an "unknown" conversion instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type ExportResult<T> = Result<T, ExportError>;

/// Top-level error type for export operations
#[derive(Error, Debug)]
pub enum ExportError {
    /// The file does not carry the SQLite magic header
    #[error("not a SQLite database: {}", path.display())]
    NotADatabase { path: PathBuf },

    /// Every access tier failed for the file
    #[error("cannot open '{}' for reading ({kind}): {source}", path.display())]
    Access {
        path: PathBuf,
        kind: AccessFailureKind,
        #[source]
        source: rusqlite::Error,
    },

    /// A single table's query or stream failed
    #[error("failed to export table '{table}': {reason}")]
    TableExport { table: String, reason: String },

    /// Database engine error outside of access negotiation
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Output writer error
    #[error("output error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable failure outside any single database
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ExportError {
    pub(crate) fn table(table: &str, reason: impl std::fmt::Display) -> Self {
        ExportError::TableExport {
            table: table.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Classification of a failure while obtaining a readable connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessFailureKind {
    /// Another process holds a conflicting lock
    Locked,
    /// The file could not be opened in this mode (permissions, read-only media, I/O)
    Unavailable,
    /// The file is not usable at all; later tiers would not help
    Fatal,
}

impl AccessFailureKind {
    /// Classify a rusqlite error by its extended SQLite error code
    pub fn classify(err: &rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Locked,
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure,
            ) => Self::Unavailable,
            _ => Self::Fatal,
        }
    }

    /// Whether the next access tier is worth attempting
    pub fn is_access_class(&self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

impl std::fmt::Display for AccessFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessFailureKind::Locked => write!(f, "locked"),
            AccessFailureKind::Unavailable => write!(f, "unavailable"),
            AccessFailureKind::Fatal => write!(f, "unusable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn sqlite_err(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn test_classify_locked() {
        assert_eq!(
            AccessFailureKind::classify(&sqlite_err(ffi::SQLITE_BUSY)),
            AccessFailureKind::Locked
        );
        assert_eq!(
            AccessFailureKind::classify(&sqlite_err(ffi::SQLITE_LOCKED)),
            AccessFailureKind::Locked
        );
    }

    #[test]
    fn test_classify_unavailable() {
        assert_eq!(
            AccessFailureKind::classify(&sqlite_err(ffi::SQLITE_CANTOPEN)),
            AccessFailureKind::Unavailable
        );
        assert!(AccessFailureKind::Unavailable.is_access_class());
    }

    #[test]
    fn test_classify_not_a_database() {
        let kind = AccessFailureKind::classify(&sqlite_err(ffi::SQLITE_NOTADB));
        assert_eq!(kind, AccessFailureKind::Fatal);
        assert!(!kind.is_access_class());

        let kind = AccessFailureKind::classify(&rusqlite::Error::InvalidQuery);
        assert_eq!(kind, AccessFailureKind::Fatal);
    }

    #[test]
    fn test_display() {
        let err = ExportError::table("visits", "boom");
        assert_eq!(err.to_string(), "failed to export table 'visits': boom");
        assert_eq!(AccessFailureKind::Locked.to_string(), "locked");
    }
}
