//! End-to-end export scenarios against real database files

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use rusqlite::Connection;
use sqlrescue::database::AccessOptions;
use sqlrescue::lens::export::{DatabaseStatus, ExportArgs, ExportLens, ExportOptions};

fn lens_in(dir: &Path) -> ExportLens {
    ExportLens::new(ExportOptions {
        output_dir: dir.join("exports"),
        access: AccessOptions {
            busy_timeout: Duration::ZERO,
            temp_root: Some(dir.join("scratch")),
        },
        ..Default::default()
    })
    .unwrap()
}

fn create_db(path: &Path, sql: &str) -> PathBuf {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(sql).unwrap();
    path.to_path_buf()
}

fn read_records(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (header, rows)
}

#[test]
fn unix_seconds_column_is_converted() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        &dir.path().join("app.db"),
        "CREATE TABLE events (id INTEGER, created_at INTEGER);
         INSERT INTO events VALUES (1, 1609459200);",
    );
    let lens = lens_in(dir.path());

    let outcome = lens.export_database(&db, &ExportArgs::default());
    assert_eq!(outcome.status, DatabaseStatus::Completed);

    let text = fs::read_to_string(dir.path().join("exports/app_events.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "id,created_at,created_at_converted,created_at_type",
            "1,1609459200,2021-01-01T00:00:00,unix",
        ]
    );
}

#[test]
fn short_files_are_skipped_without_opening() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.db");
    let short = dir.path().join("short.db");
    fs::write(&empty, b"").unwrap();
    fs::write(&short, &b"SQLite format 3\0"[..15]).unwrap();
    let lens = lens_in(dir.path());

    for path in [&empty, &short] {
        let outcome = lens.export_database(path, &ExportArgs::default());
        assert_eq!(outcome.status, DatabaseStatus::Skipped);
        assert!(outcome.access_tier.is_none());
    }

    let stats = lens.stats();
    assert_eq!(stats.files_skipped, 2);
    assert_eq!(stats.errors, 0);
    assert!(fs::read_dir(dir.path().join("exports")).unwrap().next().is_none());
    assert!(!dir.path().join("scratch").exists());
}

#[test]
fn locked_database_exports_through_private_copy() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        &dir.path().join("History"),
        "CREATE TABLE visits (id INTEGER PRIMARY KEY, url TEXT, visit_time INTEGER);
         INSERT INTO visits (url, visit_time) VALUES
            ('https://a.example', 1609459200000),
            ('https://b.example', 1609459200500);",
    );
    let lens = lens_in(dir.path());

    let lock = Connection::open(&db).unwrap();
    lock.execute_batch("PRAGMA locking_mode=EXCLUSIVE; BEGIN EXCLUSIVE;")
        .unwrap();

    let outcome = lens.export_database(&db, &ExportArgs::default());
    assert_eq!(outcome.status, DatabaseStatus::Completed);
    assert_eq!(outcome.access_tier.as_deref(), Some("private-copy"));
    assert_eq!(outcome.tables_exported(), 1);
    assert_eq!(outcome.tables[0].rows, 2);

    let (header, rows) = read_records(&dir.path().join("exports/History_visits.csv"));
    assert_eq!(
        header,
        vec!["id", "url", "visit_time", "visit_time_converted", "visit_time_type"]
    );
    assert_eq!(rows[0][3], "2021-01-01T00:00:00");
    assert_eq!(rows[0][4], "unix_ms");
    assert_eq!(rows[1][1], "https://b.example");
    assert_eq!(rows[1][3], "2021-01-01T00:00:00.500");

    // no private copy survives the call
    let scratch = dir.path().join("scratch");
    assert!(fs::read_dir(&scratch).unwrap().next().is_none());

    drop(lock);
}

#[test]
fn unmatched_table_filter_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        &dir.path().join("app.db"),
        "CREATE TABLE events (id INTEGER);",
    );
    let lens = lens_in(dir.path());

    let args = ExportArgs::default().with_tables(vec!["cookies".to_string()]);
    let outcome = lens.export_database(&db, &args);
    assert_eq!(outcome.status, DatabaseStatus::NoMatchingTables);
    assert!(outcome.tables.is_empty());
    assert_eq!(lens.stats().errors, 0);
    assert_eq!(lens.stats().tables_exported, 0);
}

#[test]
fn row_limit_caps_exported_lines() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        &dir.path().join("big.db"),
        "CREATE TABLE numbers (n INTEGER);
         WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < 10000)
         INSERT INTO numbers SELECT x FROM seq;",
    );
    let lens = lens_in(dir.path());

    let outcome = lens.export_database(&db, &ExportArgs::default().with_limit(100));
    assert_eq!(outcome.tables[0].rows, 100);

    let text = fs::read_to_string(dir.path().join("exports/big_numbers.csv")).unwrap();
    assert_eq!(text.lines().count(), 101);
}

#[test]
fn every_row_matches_header_width() {
    let dir = tempfile::tempdir().unwrap();
    let db = create_db(
        &dir.path().join("mixed.sqlite"),
        "CREATE TABLE messages (
            id INTEGER, body TEXT, date INTEGER, date_read REAL, attachment BLOB, note TEXT
         );
         INSERT INTO messages VALUES (1, 'hi, there', 631152000, 631152000.5, x'cafe', NULL);
         INSERT INTO messages VALUES (2, 'line\nbreak', NULL, 'not a number', NULL, '');
         INSERT INTO messages VALUES (3, '\"quoted\"', 42, 1700000000000, NULL, 'x');",
    );
    let lens = lens_in(dir.path());

    lens.export_database(&db, &ExportArgs::default());
    let (header, rows) = read_records(&dir.path().join("exports/mixed_messages.csv"));

    // six columns plus two derived fields for each of `date` and `date_read`
    assert_eq!(header.len(), 6 + 2 * 2);
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.len(), header.len());
    }

    assert_eq!(rows[0][1], "hi, there");
    assert_eq!(rows[0][4], "cafe");
    assert_eq!(rows[0][5], "");
    assert_eq!(rows[0][7], "cocoa");
    assert_eq!(rows[1][7], "unknown");
    assert_eq!(rows[1][9], "unknown");
    assert_eq!(rows[2][9], "unix_ms");
}

#[test]
fn folder_export_continues_past_bad_files() {
    let dir = tempfile::tempdir().unwrap();
    let evidence = dir.path().join("evidence");
    fs::create_dir_all(evidence.join("Profile")).unwrap();
    create_db(
        &evidence.join("a.db"),
        "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);",
    );
    create_db(
        &evidence.join("Profile/Cookies"),
        "CREATE TABLE cookies (name TEXT, expires_utc INTEGER);",
    );
    fs::write(evidence.join("fake.db"), b"not really a database").unwrap();
    let lens = lens_in(dir.path());

    let shutdown = AtomicBool::new(false);
    let outcomes = lens
        .export_folder(
            &evidence,
            true,
            &ExportArgs::default(),
            &shutdown,
            &|count| assert_eq!(count, 3),
            &|_| {},
        )
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    let stats = lens.stats();
    assert_eq!(stats.databases_processed, 2);
    assert_eq!(stats.tables_exported, 2);
    assert_eq!(stats.files_skipped, 1);
    assert!(dir.path().join("exports/Cookies_cookies.csv").is_file());
}

#[test]
fn parallel_export_matches_sequential_counts() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..4)
        .map(|i| {
            create_db(
                &dir.path().join(format!("db{}.db", i)),
                "CREATE TABLE t (id INTEGER, updated_at INTEGER);
                 INSERT INTO t VALUES (1, 1700000000);",
            )
        })
        .collect();

    let lens = ExportLens::new(ExportOptions {
        output_dir: dir.path().join("exports"),
        jobs: 3,
        ..Default::default()
    })
    .unwrap();

    let shutdown = AtomicBool::new(false);
    let outcomes = lens.export_paths(&paths, &ExportArgs::default(), &shutdown, &|_| {});
    assert_eq!(outcomes.len(), 4);
    assert_eq!(lens.stats().databases_processed, 4);
    assert_eq!(lens.stats().tables_exported, 4);
    for i in 0..4 {
        assert!(dir.path().join(format!("exports/db{}_t.csv", i)).is_file());
    }
}

#[test]
fn parallel_databases_with_same_stem_keep_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (sub, fill, rows) in [("p1", "a", 20_000), ("p2", "b", 5_000)] {
        fs::create_dir_all(dir.path().join(sub)).unwrap();
        paths.push(create_db(
            &dir.path().join(sub).join("History"),
            &format!(
                "CREATE TABLE t (v TEXT);
                 WITH RECURSIVE seq(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM seq WHERE x < {rows})
                 INSERT INTO t SELECT '{}' FROM seq;",
                fill.repeat(40)
            ),
        ));
    }

    let lens = ExportLens::new(ExportOptions {
        output_dir: dir.path().join("exports"),
        jobs: 2,
        ..Default::default()
    })
    .unwrap();

    let shutdown = AtomicBool::new(false);
    let outcomes = lens.export_paths(&paths, &ExportArgs::default(), &shutdown, &|_| {});
    assert_eq!(outcomes.len(), 2);

    let mut outputs: Vec<PathBuf> = outcomes.iter().map(|o| o.tables[0].output.clone()).collect();
    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), 2);

    for outcome in &outcomes {
        let table = &outcome.tables[0];
        assert!(table.is_success());
        let (header, rows) = read_records(&table.output);
        assert_eq!(header, vec!["v"]);
        assert_eq!(rows.len() as u64, table.rows);

        let expected = if outcome.path.starts_with(dir.path().join("p1")) {
            "a".repeat(40)
        } else {
            "b".repeat(40)
        };
        assert!(rows.iter().all(|r| r[0] == expected));
    }
}
