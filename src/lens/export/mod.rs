//! Database export lens
//!
//! [`ExportLens`] drives the export of whole database files: it checks the file
//! header, obtains a readable handle (falling back to a private copy for locked
//! files), streams each selected table to its own delimited text file and keeps
//! run-wide [`ExportStats`].
//!
//! Failures are absorbed at the narrowest level that owns them. A failing table
//! is recorded and its siblings still export; a failing database is recorded and
//! the next one still runs. Only setting up the output directory is fatal.
//!
//! Output paths are reserved for the lifetime of the lens. When two databases
//! share a file stem (`p1/History`, `p2/History`) and a table name, the later
//! one gets a numbered stem (`History_2_urls.csv`) instead of overwriting, or,
//! with parallel jobs, interleaving with, the earlier export.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlrescue::lens::export::{ExportArgs, ExportLens, ExportOptions};
//!
//! let lens = ExportLens::new(ExportOptions::default())?;
//! let outcome = lens.export_database("History".as_ref(), &ExportArgs::default());
//! println!("{} tables exported", outcome.tables_exported());
//! println!("{}", lens.summary(None).render_plain());
//! ```

pub mod corpus;
pub mod stats;
pub mod stream;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::SqlrescueConfig;
use crate::database::{is_valid_sqlite_database, AccessHandle, AccessOptions, TableSource};
use crate::error::{ExportError, ExportResult};
use crate::lens::probe::probe_table;
use crate::lens::utils::{export_file_name, extension_for_delimiter};

pub use corpus::{default_extensions, find_database_files, DEFAULT_EXTENSIONS};
pub use stats::{DatabaseOutcome, DatabaseStatus, ExportStats, ExportSummary, TableOutcome};
pub use stream::{export_header, stream_table, RowSink, BATCH_SIZE};

// =============================================================================
// Args
// =============================================================================

/// Per-database export arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ExportArgs {
    /// Comma-separated list of tables to export (default: all tables)
    #[cfg_attr(feature = "cli", clap(short, long, value_delimiter = ','))]
    #[serde(default)]
    pub tables: Option<Vec<String>>,

    /// Maximum number of rows exported per table
    #[cfg_attr(
        feature = "cli",
        clap(short, long, value_parser = clap::value_parser!(u64).range(1..))
    )]
    #[serde(default)]
    pub limit: Option<u64>,

    /// Comma-separated columns to convert, replacing name-based detection
    #[cfg_attr(feature = "cli", clap(long, value_delimiter = ','))]
    #[serde(default)]
    pub timestamp_columns: Option<Vec<String>>,
}

impl ExportArgs {
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_timestamp_columns(mut self, columns: Vec<String>) -> Self {
        self.timestamp_columns = Some(columns);
        self
    }
}

/// Options fixed for the lifetime of an [`ExportLens`]
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub delimiter: u8,
    pub access: AccessOptions,
    /// Databases exported concurrently; 1 exports sequentially
    pub jobs: usize,
    pub extensions: Vec<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            output_dir: PathBuf::from("./sqlite_exports"),
            delimiter: b',',
            access: AccessOptions::default(),
            jobs: 1,
            extensions: default_extensions(),
        }
    }
}

impl ExportOptions {
    pub fn from_config(config: &SqlrescueConfig) -> Self {
        ExportOptions {
            output_dir: PathBuf::from(&config.output_dir),
            delimiter: config.delimiter,
            access: AccessOptions {
                busy_timeout: config.busy_timeout(),
                temp_root: config.temp_dir.as_ref().map(PathBuf::from),
            },
            jobs: config.jobs.max(1),
            extensions: config.extensions.clone(),
        }
    }
}

// =============================================================================
// Inspection types
// =============================================================================

/// Dry-run view of one table
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct TableInspection {
    pub table: String,
    pub rows: u64,
    pub columns: usize,
    #[cfg_attr(feature = "display", tabled(display = "display_list"))]
    pub timestamp_columns: Vec<String>,
}

#[cfg(feature = "display")]
fn display_list(items: &[String]) -> String {
    items.join(", ")
}

/// Dry-run view of one database
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseInspection {
    pub path: PathBuf,
    pub access_tier: String,
    pub tables: Vec<TableInspection>,
}

// =============================================================================
// Lens
// =============================================================================

/// Database export lens
pub struct ExportLens {
    options: ExportOptions,
    stats: Mutex<ExportStats>,
    reserved_outputs: Mutex<HashSet<PathBuf>>,
}

impl ExportLens {
    /// Create a lens, creating the output directory if needed
    ///
    /// Failing to create the output directory is fatal for the whole run.
    pub fn new(mut options: ExportOptions) -> ExportResult<Self> {
        fs::create_dir_all(&options.output_dir).map_err(|e| {
            ExportError::Fatal(format!(
                "cannot create output directory '{}': {}",
                options.output_dir.display(),
                e
            ))
        })?;
        if let Ok(absolute) = fs::canonicalize(&options.output_dir) {
            options.output_dir = absolute;
        }
        Ok(ExportLens {
            options,
            stats: Mutex::new(ExportStats::default()),
            reserved_outputs: Mutex::new(HashSet::new()),
        })
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Output directory, absolute when it could be resolved
    pub fn output_dir(&self) -> &Path {
        &self.options.output_dir
    }

    /// Snapshot of the run statistics
    pub fn stats(&self) -> ExportStats {
        *self.lock_stats()
    }

    /// End-of-run summary
    pub fn summary(&self, elapsed: Option<Duration>) -> ExportSummary {
        ExportSummary::new(self.stats(), self.options.output_dir.clone(), elapsed)
    }

    fn lock_stats(&self) -> MutexGuard<'_, ExportStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim an output path no other export of this lens has written
    fn reserve_output(&self, db_stem: &str, table: &str, extension: &str) -> PathBuf {
        let mut reserved = self
            .reserved_outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut output = self
            .options
            .output_dir
            .join(export_file_name(db_stem, table, extension));
        let mut n = 1;
        while !reserved.insert(output.clone()) {
            n += 1;
            let stem = format!("{}_{}", db_stem, n);
            output = self
                .options
                .output_dir
                .join(export_file_name(&stem, table, extension));
        }
        if n > 1 {
            warn!(
                table,
                output = %output.display(),
                "output name already used in this run, writing to a numbered file"
            );
        }
        output
    }

    /// Export every selected table of one database file
    pub fn export_database(&self, path: &Path, args: &ExportArgs) -> DatabaseOutcome {
        let outcome = self.run_database(path, args);
        self.lock_stats().record(&outcome);
        outcome
    }

    fn run_database(&self, path: &Path, args: &ExportArgs) -> DatabaseOutcome {
        if !is_valid_sqlite_database(path) {
            warn!(path = %path.display(), "skipping invalid SQLite database");
            return DatabaseOutcome::new(path.to_path_buf(), DatabaseStatus::Skipped);
        }
        info!(path = %path.display(), "processing database");

        let handle = match AccessHandle::acquire(path, &self.options.access) {
            Ok(handle) => handle,
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot open database");
                return DatabaseOutcome::new(
                    path.to_path_buf(),
                    DatabaseStatus::AccessFailed {
                        error: e.to_string(),
                    },
                );
            }
        };

        let tier = handle.tier();
        let outcome = self.export_tables(&handle, path, args);
        handle.release();
        outcome.with_tier(tier)
    }

    fn export_tables(&self, handle: &AccessHandle, path: &Path, args: &ExportArgs) -> DatabaseOutcome {
        let conn = handle.conn();
        let all_tables = match conn.list_tables() {
            Ok(tables) => tables,
            Err(e) => {
                error!(path = %path.display(), error = %e, "error getting table list");
                return DatabaseOutcome::new(
                    path.to_path_buf(),
                    DatabaseStatus::Failed {
                        error: e.to_string(),
                    },
                );
            }
        };

        let selected: Vec<String> = match &args.tables {
            Some(filter) => all_tables.into_iter().filter(|t| filter.contains(t)).collect(),
            None => all_tables,
        };
        if selected.is_empty() {
            if let Some(filter) = &args.tables {
                warn!(path = %path.display(), tables = ?filter, "no matching tables found");
                return DatabaseOutcome::new(path.to_path_buf(), DatabaseStatus::NoMatchingTables);
            }
        }

        let db_stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_for_delimiter(self.options.delimiter);

        let mut outcome = DatabaseOutcome::new(path.to_path_buf(), DatabaseStatus::Completed);
        for table in selected {
            let output = self.reserve_output(&db_stem, &table, extension);
            info!(table = table.as_str(), "exporting table");

            let table_outcome = match self.export_table(conn, &table, &output, args) {
                Ok(rows) => {
                    info!(table = table.as_str(), rows, output = %output.display(), "saved rows");
                    TableOutcome {
                        table,
                        output,
                        rows,
                        error: None,
                    }
                }
                Err(e) => {
                    error!(table = table.as_str(), path = %path.display(), error = %e, "failed to export table");
                    TableOutcome {
                        table,
                        output,
                        rows: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcome.tables.push(table_outcome);
        }
        outcome
    }

    fn export_table<S: TableSource + ?Sized>(
        &self,
        source: &S,
        table: &str,
        output: &Path,
        args: &ExportArgs,
    ) -> ExportResult<u64> {
        if output.exists() {
            warn!(output = %output.display(), "overwriting existing export");
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .from_path(output)
            .map_err(|e| ExportError::table(table, e))?;
        stream_table(
            source,
            table,
            &mut writer,
            args.limit,
            args.timestamp_columns.as_deref(),
        )
    }

    /// Export many database files
    ///
    /// Databases already started always finish; once `shutdown` is set no new
    /// database is started. `on_done` is called after each database.
    pub fn export_paths(
        &self,
        paths: &[PathBuf],
        args: &ExportArgs,
        shutdown: &AtomicBool,
        on_done: &(dyn Fn(&DatabaseOutcome) + Sync),
    ) -> Vec<DatabaseOutcome> {
        let run_one = |path: &PathBuf| -> Option<DatabaseOutcome> {
            if shutdown.load(Ordering::SeqCst) {
                return None;
            }
            let outcome = self.export_database(path, args);
            on_done(&outcome);
            Some(outcome)
        };

        #[cfg(feature = "parallel")]
        if self.options.jobs > 1 {
            use rayon::prelude::*;

            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
            {
                Ok(pool) => {
                    return pool.install(|| paths.par_iter().filter_map(run_one).collect());
                }
                Err(e) => warn!(error = %e, "cannot start worker pool, exporting sequentially"),
            }
        }

        paths.iter().map_while(run_one).collect()
    }

    /// Discover databases under `root` and export them all
    pub fn export_folder(
        &self,
        root: &Path,
        recursive: bool,
        args: &ExportArgs,
        shutdown: &AtomicBool,
        on_found: &dyn Fn(usize),
        on_done: &(dyn Fn(&DatabaseOutcome) + Sync),
    ) -> ExportResult<Vec<DatabaseOutcome>> {
        let paths = find_database_files(root, recursive, &self.options.extensions)?;
        info!(count = paths.len(), root = %root.display(), "found SQLite files");
        on_found(paths.len());
        Ok(self.export_paths(&paths, args, shutdown, on_done))
    }

    /// Describe a database without exporting anything
    pub fn inspect_database(&self, path: &Path) -> ExportResult<DatabaseInspection> {
        if !is_valid_sqlite_database(path) {
            return Err(ExportError::NotADatabase {
                path: path.to_path_buf(),
            });
        }

        let handle = AccessHandle::acquire(path, &self.options.access)?;
        let result = inspect_tables(handle.conn());
        let tier = handle.tier();
        handle.release();

        Ok(DatabaseInspection {
            path: path.to_path_buf(),
            access_tier: tier.to_string(),
            tables: result?,
        })
    }
}

fn inspect_tables<S: TableSource + ?Sized>(source: &S) -> ExportResult<Vec<TableInspection>> {
    let mut tables = Vec::new();
    for table in source.list_tables()? {
        let columns = source.result_columns(&table)?;
        tables.push(TableInspection {
            rows: source.row_count(&table)?,
            columns: columns.len(),
            timestamp_columns: probe_table(source, &table),
            table,
        });
    }
    Ok(tables)
}
