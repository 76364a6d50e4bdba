//! Locked-file access strategy
//!
//! Obtains a readable connection to a database file that may be held open, or
//! exclusively locked, by another process. Three tiers are tried in order:
//!
//! 1. [`AccessTier::ReadOnly`]: open read-only, never contending for a write lock
//! 2. [`AccessTier::DirectOpen`]: open with default read/write semantics
//! 3. [`AccessTier::PrivateCopy`]: copy the file into a private temporary
//!    directory and open the copy
//!
//! A tier is only attempted when the previous one failed with an access-class
//! error (see [`AccessFailureKind`]). The private copy is only made when the
//! failure is a lock conflict. Anything else, such as a file that is not a
//! database at all, fails immediately.
//!
//! # Known limitation
//!
//! The copy is taken while the owner may still be writing. Sibling `-wal` and
//! `-journal` files are copied alongside the main file when present, but the
//! files are copied one after another, not atomically, so a copy taken
//! mid-write can still be inconsistent.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::database::core::{DatabaseConn, OpenMode};
use crate::error::{AccessFailureKind, ExportError, ExportResult};

/// Auxiliary files SQLite keeps next to the main database file
const SIBLING_SUFFIXES: [&str; 2] = ["-wal", "-journal"];

/// Prefix of private copy directories
const TEMP_PREFIX: &str = "sqlrescue-";

/// Access tier that produced a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTier {
    ReadOnly,
    DirectOpen,
    PrivateCopy,
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessTier::ReadOnly => write!(f, "read-only"),
            AccessTier::DirectOpen => write!(f, "direct"),
            AccessTier::PrivateCopy => write!(f, "private-copy"),
        }
    }
}

/// Options for acquiring a handle
#[derive(Debug, Clone, Default)]
pub struct AccessOptions {
    /// How long SQLite waits on a conflicting lock before giving up on a tier
    pub busy_timeout: Duration,
    /// Parent directory for private copies, system temp dir when `None`
    pub temp_root: Option<PathBuf>,
}

/// A byte copy of a database in a private temporary directory
struct PrivateCopy {
    dir: TempDir,
    db_path: PathBuf,
}

impl PrivateCopy {
    fn create(original: &Path, temp_root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let dir = match temp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let file_name = original
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "database".into());
        let db_path = dir.path().join(&file_name);
        copy_preserving_mtime(original, &db_path)?;

        for suffix in SIBLING_SUFFIXES {
            let mut sibling = original.as_os_str().to_os_string();
            sibling.push(suffix);
            let sibling = PathBuf::from(sibling);
            if !sibling.is_file() {
                continue;
            }
            let mut target = db_path.as_os_str().to_os_string();
            target.push(suffix);
            if let Err(e) = copy_preserving_mtime(&sibling, Path::new(&target)) {
                warn!(path = %sibling.display(), error = %e, "could not copy auxiliary file");
            }
        }

        Ok(PrivateCopy { dir, db_path })
    }

    fn remove(self) {
        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %dir.display(), error = %e, "could not clean up temp directory");
        }
    }
}

fn copy_preserving_mtime(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to)?;
    if let Ok(modified) = fs::metadata(from).and_then(|m| m.modified()) {
        File::options().write(true).open(to)?.set_modified(modified)?;
    }
    Ok(())
}

/// An open readable connection, optionally backed by a private copy
///
/// Fields drop in declaration order, so the connection is always closed before
/// the private copy is removed, including on unwinding. Prefer
/// [`AccessHandle::release`], which does the same but logs failures.
pub struct AccessHandle {
    conn: DatabaseConn,
    private_copy: Option<PrivateCopy>,
    tier: AccessTier,
    source_path: PathBuf,
}

impl AccessHandle {
    /// Obtain a readable handle, falling back through the access tiers
    pub fn acquire(path: &Path, options: &AccessOptions) -> ExportResult<Self> {
        let first_err = match open_verified(path, OpenMode::ReadOnly, options.busy_timeout) {
            Ok(conn) => return Ok(Self::new(conn, None, AccessTier::ReadOnly, path)),
            Err(e) => e,
        };
        let first_kind = AccessFailureKind::classify(&first_err);
        if !first_kind.is_access_class() {
            return Err(access_error(path, first_kind, first_err));
        }
        debug!(path = %path.display(), error = %first_err, "read-only open failed, trying direct open");

        let err = match open_verified(path, OpenMode::ReadWrite, options.busy_timeout) {
            Ok(conn) => return Ok(Self::new(conn, None, AccessTier::DirectOpen, path)),
            Err(e) => e,
        };
        let kind = AccessFailureKind::classify(&err);
        let (lock_kind, lock_err) = match (first_kind, kind) {
            (_, AccessFailureKind::Locked) => (kind, err),
            (AccessFailureKind::Locked, AccessFailureKind::Unavailable) => (first_kind, first_err),
            _ => return Err(access_error(path, kind, err)),
        };

        info!(path = %path.display(), "database locked, creating temporary copy");
        let copy = match PrivateCopy::create(path, options.temp_root.as_deref()) {
            Ok(copy) => copy,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to copy locked database");
                return Err(access_error(path, lock_kind, lock_err));
            }
        };

        match open_verified(&copy.db_path, OpenMode::ReadWrite, options.busy_timeout) {
            Ok(conn) => Ok(Self::new(conn, Some(copy), AccessTier::PrivateCopy, path)),
            Err(e) => {
                let kind = AccessFailureKind::classify(&e);
                copy.remove();
                Err(access_error(path, kind, e))
            }
        }
    }

    fn new(
        conn: DatabaseConn,
        private_copy: Option<PrivateCopy>,
        tier: AccessTier,
        source_path: &Path,
    ) -> Self {
        AccessHandle {
            conn,
            private_copy,
            tier,
            source_path: source_path.to_path_buf(),
        }
    }

    /// The readable connection
    pub fn conn(&self) -> &DatabaseConn {
        &self.conn
    }

    /// Tier that produced this handle
    pub fn tier(&self) -> AccessTier {
        self.tier
    }

    /// The original database path, even when reading from a copy
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Directory holding the private copy, if one was made
    pub fn private_copy_dir(&self) -> Option<&Path> {
        self.private_copy.as_ref().map(|c| c.dir.path())
    }

    /// Close the connection, then remove the private copy
    ///
    /// Failures are logged; neither is fatal.
    pub fn release(self) {
        let AccessHandle {
            conn,
            private_copy,
            source_path,
            ..
        } = self;

        if let Err(e) = conn.close() {
            warn!(path = %source_path.display(), error = %e, "error closing database");
        }
        if let Some(copy) = private_copy {
            copy.remove();
        }
    }
}

fn open_verified(path: &Path, mode: OpenMode, busy_timeout: Duration) -> rusqlite::Result<DatabaseConn> {
    let conn = DatabaseConn::open(path, mode, busy_timeout)?;
    conn.probe_readable()?;
    Ok(conn)
}

fn access_error(path: &Path, kind: AccessFailureKind, source: rusqlite::Error) -> ExportError {
    ExportError::Access {
        path: path.to_path_buf(),
        kind,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::TableSource;
    use rusqlite::Connection;

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("History");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE visits (id INTEGER PRIMARY KEY, visit_time INTEGER);
             INSERT INTO visits (visit_time) VALUES (13300000000000000), (13300000001000000);",
        )
        .unwrap();
        path
    }

    /// Hold an exclusive lock on the database until the returned connection drops
    fn lock_exclusively(path: &Path) -> Connection {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("PRAGMA locking_mode=EXCLUSIVE; BEGIN EXCLUSIVE;")
            .unwrap();
        conn
    }

    #[test]
    fn test_read_only_tier() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());

        let handle = AccessHandle::acquire(&path, &AccessOptions::default()).unwrap();
        assert_eq!(handle.tier(), AccessTier::ReadOnly);
        assert!(handle.private_copy_dir().is_none());
        assert_eq!(handle.conn().row_count("visits").unwrap(), 2);
        handle.release();
    }

    #[test]
    fn test_private_copy_when_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let temp_root = dir.path().join("scratch");
        let _lock = lock_exclusively(&path);

        let options = AccessOptions {
            busy_timeout: Duration::ZERO,
            temp_root: Some(temp_root.clone()),
        };
        let handle = AccessHandle::acquire(&path, &options).unwrap();
        assert_eq!(handle.tier(), AccessTier::PrivateCopy);
        assert_eq!(handle.source_path(), path.as_path());
        assert_eq!(handle.conn().row_count("visits").unwrap(), 2);

        let copy_dir = handle.private_copy_dir().unwrap().to_path_buf();
        assert!(copy_dir.starts_with(&temp_root));
        assert!(copy_dir.join("History").is_file());

        handle.release();
        assert!(!copy_dir.exists());
    }

    #[test]
    fn test_private_copy_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let _lock = lock_exclusively(&path);

        let options = AccessOptions {
            busy_timeout: Duration::ZERO,
            temp_root: Some(dir.path().join("scratch")),
        };
        let handle = AccessHandle::acquire(&path, &options).unwrap();
        let copy_dir = handle.private_copy_dir().unwrap().to_path_buf();
        drop(handle);
        assert!(!copy_dir.exists());
    }

    #[test]
    fn test_failed_copy_reports_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path());
        let _lock = lock_exclusively(&path);

        // a directory cannot be created beneath a regular file
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let temp_root = blocker.join("scratch");

        let options = AccessOptions {
            busy_timeout: Duration::ZERO,
            temp_root: Some(temp_root.clone()),
        };
        let err = AccessHandle::acquire(&path, &options).err().unwrap();
        match err {
            ExportError::Access { kind, path: failed, .. } => {
                assert_eq!(kind, AccessFailureKind::Locked);
                assert_eq!(failed, path);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp_root.exists());
        assert!(blocker.is_file());
    }

    #[test]
    fn test_not_a_database_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();
        let temp_root = dir.path().join("scratch");

        let options = AccessOptions {
            busy_timeout: Duration::ZERO,
            temp_root: Some(temp_root.clone()),
        };
        let err = AccessHandle::acquire(&path, &options).err().unwrap();
        match err {
            ExportError::Access { kind, .. } => assert_eq!(kind, AccessFailureKind::Fatal),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!temp_root.exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AccessHandle::acquire(&dir.path().join("gone.db"), &AccessOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ExportError::Access { .. }));
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(AccessTier::PrivateCopy.to_string(), "private-copy");
    }
}
