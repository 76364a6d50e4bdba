//! Discovery of database files under a folder

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::database::is_valid_sqlite_database;
use crate::error::{ExportError, ExportResult};

/// File extensions treated as SQLite databases without reading them
pub const DEFAULT_EXTENSIONS: [&str; 6] = [".sqlite", ".db", ".sqlite3", ".db3", ".s3db", ".sl3"];

/// Find candidate database files under `root`
///
/// A regular file qualifies when its lowercased name ends with one of
/// `extensions`, or when it carries the SQLite header regardless of name
/// (browser profiles keep databases in files like `History` or `Cookies`).
/// Symlinked directories are not followed. Results are sorted by path.
pub fn find_database_files(
    root: &Path,
    recursive: bool,
    extensions: &[String],
) -> ExportResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("folder does not exist: {}", root.display()),
        )));
    }

    let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "cannot read directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_real_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_real_dir {
                if recursive {
                    pending.push(path);
                }
                continue;
            }
            if !path.is_file() {
                continue;
            }
            if has_database_extension(&path, &extensions) || is_valid_sqlite_database(&path) {
                debug!(path = %path.display(), "found database candidate");
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn has_database_extension(path: &Path, extensions: &[String]) -> bool {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy().to_lowercase(),
        None => return false,
    };
    extensions.iter().any(|ext| name.ends_with(ext.as_str()))
}

/// Default extension list as owned strings
pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}
