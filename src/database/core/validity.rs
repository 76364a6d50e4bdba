//! SQLite file validity check
//!
//! A file only counts as a database if it starts with the 16-byte SQLite header
//! string. The check reads the header directly and never hands the file to the
//! query engine, so unrelated files are not mistaken for locked or corrupt
//! databases.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::warn;

/// Magic header of a SQLite 3 database file
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Check whether a path is a regular file carrying the SQLite magic header
pub fn is_valid_sqlite_database(path: &Path) -> bool {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return false,
    };
    if !metadata.is_file() || metadata.len() < SQLITE_MAGIC.len() as u64 {
        return false;
    }

    let mut header = [0u8; 16];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => &header == SQLITE_MAGIC,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "error reading SQLite header");
            false
        }
    }
}
