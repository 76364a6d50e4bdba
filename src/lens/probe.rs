//! Timestamp column detection
//!
//! Columns are selected purely by name: a column is a timestamp candidate when
//! its lowercased name contains any of [`TIMESTAMP_KEYWORDS`]. The match is
//! deliberately broad, so `lastname` is selected while `ts` is not; declared
//! types and observed values are not consulted.

use serde::Serialize;
use tracing::warn;

use crate::database::{ColumnInfo, TableSource};

/// Substrings that mark a column name as a likely timestamp
pub const TIMESTAMP_KEYWORDS: [&str; 9] = [
    "time", "date", "stamp", "created", "modified", "accessed", "last", "epoch", "visit",
];

/// A column selected for timestamp conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampCandidate {
    pub name: String,
    /// Position of the column in the exported row
    pub position: usize,
}

impl TimestampCandidate {
    /// Locate candidate names within the result columns of a table
    ///
    /// Names that do not appear in `columns` are dropped, and duplicates are
    /// kept once, so the derived fields always line up with the header.
    pub fn resolve(names: &[String], columns: &[String]) -> Vec<TimestampCandidate> {
        let mut candidates: Vec<TimestampCandidate> = Vec::with_capacity(names.len());
        for name in names {
            if candidates.iter().any(|c| &c.name == name) {
                continue;
            }
            if let Some(position) = columns.iter().position(|c| c == name) {
                candidates.push(TimestampCandidate {
                    name: name.clone(),
                    position,
                });
            }
        }
        candidates
    }
}

/// Whether a column name looks like it holds a time value
pub fn is_timestamp_column_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    TIMESTAMP_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Select timestamp candidates from column metadata, in table order
pub fn probe_timestamp_columns(columns: &[ColumnInfo]) -> Vec<String> {
    let mut ordered: Vec<&ColumnInfo> = columns.iter().collect();
    ordered.sort_by_key(|c| c.ordinal);
    ordered
        .into_iter()
        .filter(|c| is_timestamp_column_name(&c.name))
        .map(|c| c.name.clone())
        .collect()
}

/// Probe a table through a source; unreadable metadata yields no candidates
pub fn probe_table<S: TableSource + ?Sized>(source: &S, table: &str) -> Vec<String> {
    match source.table_columns(table) {
        Ok(columns) => probe_timestamp_columns(&columns),
        Err(e) => {
            warn!(table, error = %e, "could not detect timestamp columns");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .enumerate()
            .map(|(ordinal, name)| ColumnInfo {
                ordinal,
                name: name.to_string(),
                declared_type: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_keyword_matching() {
        assert!(is_timestamp_column_name("last_visit_time"));
        assert!(is_timestamp_column_name("DateAdded"));
        assert!(is_timestamp_column_name("ZCREATEDAT"));
        assert!(is_timestamp_column_name("lastname"));
        assert!(is_timestamp_column_name("visit_count"));
        assert!(!is_timestamp_column_name("ts"));
        assert!(!is_timestamp_column_name("url"));
    }

    #[test]
    fn test_probe_preserves_table_order() {
        let cols = columns(&["id", "url", "title", "visit_count", "last_visit_time", "hidden"]);
        assert_eq!(
            probe_timestamp_columns(&cols),
            vec!["visit_count", "last_visit_time"]
        );

        let mut shuffled = cols.clone();
        shuffled.reverse();
        assert_eq!(
            probe_timestamp_columns(&shuffled),
            vec!["visit_count", "last_visit_time"]
        );
    }

    #[test]
    fn test_probe_empty() {
        assert!(probe_timestamp_columns(&columns(&["id", "ts", "body"])).is_empty());
        assert!(probe_timestamp_columns(&[]).is_empty());
    }

    #[test]
    fn test_resolve_candidates() {
        let header: Vec<String> = ["id", "created", "modified"].iter().map(|s| s.to_string()).collect();
        let names: Vec<String> = ["modified", "missing", "created", "modified"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let candidates = TimestampCandidate::resolve(&names, &header);
        assert_eq!(
            candidates,
            vec![
                TimestampCandidate { name: "modified".to_string(), position: 2 },
                TimestampCandidate { name: "created".to_string(), position: 1 },
            ]
        );
    }

    #[test]
    fn test_probe_table_missing_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE events (id INTEGER, created_at INTEGER)")
            .unwrap();
        let db = crate::database::DatabaseConn::open(
            &path,
            crate::database::OpenMode::ReadOnly,
            std::time::Duration::ZERO,
        )
        .unwrap();

        assert_eq!(probe_table(&db, "events"), vec!["created_at"]);
        // PRAGMA table_info on a missing table returns no rows
        assert!(probe_table(&db, "nope").is_empty());
    }
}
