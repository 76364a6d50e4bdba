#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! sqlrescue - forensic SQLite table exporter
//!
//! sqlrescue exports every table of SQLite database files, including files that
//! are held open or locked by a running application, into delimited text. Columns
//! whose names suggest a timestamp are converted to calendar time under the
//! epoch convention their magnitude suggests (WebKit, Unix, Unix milliseconds
//! or Cocoa). It can be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Library: access, probing, streaming, export | `rusqlite`, `csv`, `chrono` |
//! | `parallel` | Export several databases concurrently | `rayon` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | Full CLI binary | All above + `clap`, `indicatif`, `ctrlc` |
//!
//! ```toml
//! # Library only
//! sqlrescue = { version = "0.1", default-features = false }
//!
//! # Default (CLI binary)
//! sqlrescue = "0.1"
//! ```
//!
//! # Architecture
//!
//! - **[`database`]**: database access
//!   - `core`: connections, the [`TableSource`] capability and the header check
//!   - `access`: read-only, direct and private-copy access tiers for locked files
//!
//! - **[`lens`]**: business logic
//!   - `timestamp`: epoch convention classification and conversion
//!   - `probe`: timestamp candidate columns by name
//!   - `export`: table streaming, per-database orchestration, folder discovery
//!
//! - **[`config`]**: configuration management
//! - **[`error`]**: error taxonomy
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use sqlrescue::lens::export::{ExportArgs, ExportLens, ExportOptions};
//!
//! let lens = ExportLens::new(ExportOptions::default())?;
//! let outcome = lens.export_database("Profile/History".as_ref(), &ExportArgs::default());
//! for table in &outcome.tables {
//!     println!("{} -> {} ({} rows)", table.table, table.output.display(), table.rows);
//! }
//! ```
//!
//! ## Timestamp Classification
//!
//! ```rust,ignore
//! use sqlrescue::lens::timestamp::{ClassifyArgs, TimestampLens};
//!
//! let lens = TimestampLens::new();
//! let results = lens.classify_args(&ClassifyArgs::new(vec!["1609459200".into()]));
//! assert_eq!(results[0].converted.as_deref(), Some("2021-01-01T00:00:00"));
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

pub use config::SqlrescueConfig;

// =============================================================================
// Errors
// =============================================================================

pub use error::{AccessFailureKind, ExportError, ExportResult};

// =============================================================================
// Database Module
// =============================================================================

pub use database::{
    is_valid_sqlite_database, AccessHandle, AccessOptions, AccessTier, ColumnInfo, DatabaseConn,
    OpenMode, RawValue, Row, TableSource,
};

// =============================================================================
// Lens Module
// =============================================================================

pub use lens::export::{
    find_database_files, DatabaseOutcome, DatabaseStatus, ExportArgs, ExportLens, ExportOptions,
    ExportStats, ExportSummary, TableOutcome,
};
pub use lens::probe::probe_timestamp_columns;
pub use lens::timestamp::{classify, ClassifyMode, Convention, ConversionResult, TimestampLens};
pub use lens::utils::OutputFormat;
