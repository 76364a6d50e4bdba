//! Export outcomes and run statistics

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::database::AccessTier;
use crate::lens::utils::OutputFormat;

/// Result of exporting one table
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub output: PathBuf,
    /// Data rows written; zero when the export failed
    pub rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// How a database export ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatabaseStatus {
    /// Tables were attempted; see the per-table outcomes
    Completed,
    /// The file failed the validity check
    Skipped,
    /// A table filter matched nothing in this database
    NoMatchingTables,
    /// No access tier could read the file
    AccessFailed { error: String },
    /// The database was readable but its table list was not
    Failed { error: String },
}

/// Result of exporting one database file
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: DatabaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_tier: Option<String>,
    pub tables: Vec<TableOutcome>,
}

impl DatabaseOutcome {
    pub(crate) fn new(path: PathBuf, status: DatabaseStatus) -> Self {
        DatabaseOutcome {
            path,
            status,
            access_tier: None,
            tables: Vec::new(),
        }
    }

    pub(crate) fn with_tier(mut self, tier: AccessTier) -> Self {
        self.access_tier = Some(tier.to_string());
        self
    }

    pub fn tables_exported(&self) -> usize {
        self.tables.iter().filter(|t| t.is_success()).count()
    }

    pub fn tables_failed(&self) -> usize {
        self.tables.iter().filter(|t| !t.is_success()).count()
    }
}

/// Run-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub databases_processed: u64,
    pub tables_exported: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

impl ExportStats {
    /// Fold one database outcome into the counters
    pub fn record(&mut self, outcome: &DatabaseOutcome) {
        match &outcome.status {
            DatabaseStatus::Skipped => self.files_skipped += 1,
            DatabaseStatus::NoMatchingTables => {}
            DatabaseStatus::AccessFailed { .. } | DatabaseStatus::Failed { .. } => self.errors += 1,
            DatabaseStatus::Completed => {
                self.databases_processed += 1;
                self.tables_exported += outcome.tables_exported() as u64;
                self.errors += outcome.tables_failed() as u64;
            }
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    #[serde(flatten)]
    pub stats: ExportStats,
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
    pub interrupted: bool,
}

#[cfg_attr(feature = "display", derive(tabled::Tabled))]
struct SummaryLine {
    item: &'static str,
    value: String,
}

impl ExportSummary {
    pub fn new(stats: ExportStats, output_dir: PathBuf, elapsed: Option<Duration>) -> Self {
        ExportSummary {
            stats,
            output_dir,
            elapsed: elapsed.map(|d| {
                humantime::format_duration(Duration::from_millis(d.as_millis() as u64)).to_string()
            }),
            interrupted: false,
        }
    }

    fn lines(&self) -> Vec<SummaryLine> {
        let mut lines = vec![
            SummaryLine {
                item: "Databases processed",
                value: self.stats.databases_processed.to_string(),
            },
            SummaryLine {
                item: "Tables exported",
                value: self.stats.tables_exported.to_string(),
            },
            SummaryLine {
                item: "Files skipped",
                value: self.stats.files_skipped.to_string(),
            },
            SummaryLine {
                item: "Errors",
                value: self.stats.errors.to_string(),
            },
            SummaryLine {
                item: "Output directory",
                value: self.output_dir.display().to_string(),
            },
        ];
        if let Some(elapsed) = &self.elapsed {
            lines.push(SummaryLine {
                item: "Elapsed",
                value: elapsed.clone(),
            });
        }
        if self.interrupted {
            lines.push(SummaryLine {
                item: "Interrupted",
                value: "yes".to_string(),
            });
        }
        lines
    }

    /// Render the summary for display
    pub fn render(&self, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Table | OutputFormat::Markdown => {
                #[cfg(feature = "display")]
                {
                    use tabled::settings::Style;
                    use tabled::Table;
                    let mut table = Table::new(self.lines());
                    if matches!(format, OutputFormat::Markdown) {
                        table.with(Style::markdown());
                    } else {
                        table.with(Style::rounded());
                    }
                    table.to_string()
                }
                #[cfg(not(feature = "display"))]
                {
                    self.render_plain()
                }
            }
            OutputFormat::Json => serde_json::to_string(self).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(self).unwrap_or_default(),
            OutputFormat::Psv => {
                let mut out = vec!["item|value".to_string()];
                out.extend(self.lines().into_iter().map(|l| format!("{}|{}", l.item, l.value)));
                out.join("\n")
            }
        }
    }

    /// Plain multi-line summary
    pub fn render_plain(&self) -> String {
        let rule = "=".repeat(50);
        let mut out = vec![rule.clone(), "EXPORT SUMMARY".to_string(), rule.clone()];
        out.extend(
            self.lines()
                .into_iter()
                .map(|l| format!("{:<20} {}", format!("{}:", l.item), l.value)),
        );
        out.push(rule);
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, error: Option<&str>) -> TableOutcome {
        TableOutcome {
            table: name.to_string(),
            output: PathBuf::from(format!("/out/{}.csv", name)),
            rows: if error.is_none() { 10 } else { 0 },
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_record_completed() {
        let mut outcome = DatabaseOutcome::new(PathBuf::from("History"), DatabaseStatus::Completed);
        outcome.tables = vec![table("urls", None), table("visits", Some("boom")), table("meta", None)];

        let mut stats = ExportStats::default();
        stats.record(&outcome);
        assert_eq!(
            stats,
            ExportStats {
                databases_processed: 1,
                tables_exported: 2,
                files_skipped: 0,
                errors: 1,
            }
        );
    }

    #[test]
    fn test_record_non_completed() {
        let mut stats = ExportStats::default();
        stats.record(&DatabaseOutcome::new(PathBuf::from("a"), DatabaseStatus::Skipped));
        stats.record(&DatabaseOutcome::new(PathBuf::from("b"), DatabaseStatus::NoMatchingTables));
        stats.record(&DatabaseOutcome::new(
            PathBuf::from("c"),
            DatabaseStatus::AccessFailed {
                error: "locked".to_string(),
            },
        ));
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.databases_processed, 0);
    }

    #[test]
    fn test_outcome_json() {
        let outcome = DatabaseOutcome::new(
            PathBuf::from("x.db"),
            DatabaseStatus::AccessFailed {
                error: "nope".to_string(),
            },
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "access_failed");
        assert_eq!(json["error"], "nope");
    }

    #[test]
    fn test_summary_render() {
        let stats = ExportStats {
            databases_processed: 3,
            tables_exported: 12,
            files_skipped: 1,
            errors: 2,
        };
        let summary = ExportSummary::new(
            stats,
            PathBuf::from("/tmp/exports"),
            Some(Duration::from_millis(1500)),
        );

        let psv = summary.render(&OutputFormat::Psv);
        assert!(psv.starts_with("item|value\n"));
        assert!(psv.contains("Tables exported|12"));
        assert!(psv.contains("Output directory|/tmp/exports"));
        assert!(psv.contains("Elapsed|1s 500ms"));

        let json: serde_json::Value =
            serde_json::from_str(&summary.render(&OutputFormat::Json)).unwrap();
        assert_eq!(json["databases_processed"], 3);
        assert_eq!(json["interrupted"], false);

        let plain = summary.render_plain();
        assert!(plain.contains("EXPORT SUMMARY"));
        assert!(plain.contains("Errors:"));
    }
}
