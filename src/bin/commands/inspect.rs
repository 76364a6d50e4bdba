use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use sqlrescue::lens::export::{DatabaseInspection, ExportLens, ExportOptions};
use sqlrescue::lens::utils::OutputFormat;
use sqlrescue::SqlrescueConfig;
use tabled::settings::Style;
use tabled::Table;

/// Arguments for the Inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// SQLite database files to inspect
    #[clap(name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

pub fn run(config: &SqlrescueConfig, args: InspectArgs, output_format: OutputFormat) -> Result<()> {
    let lens = ExportLens::new(ExportOptions::from_config(config)).map_err(|e| anyhow!("{}", e))?;

    let mut inspections = Vec::new();
    let mut failed = 0;
    for file in &args.files {
        match lens.inspect_database(file) {
            Ok(inspection) => inspections.push(inspection),
            Err(e) => {
                eprintln!("ERROR: {}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    format_output(&inspections, output_format);

    if failed > 0 && inspections.is_empty() {
        return Err(anyhow!("no database could be inspected"));
    }
    Ok(())
}

fn format_output(inspections: &[DatabaseInspection], output_format: OutputFormat) {
    match output_format {
        OutputFormat::Table | OutputFormat::Markdown => {
            for inspection in inspections {
                println!(
                    "{} (access: {})",
                    inspection.path.display(),
                    inspection.access_tier
                );
                let mut table = Table::new(&inspection.tables);
                if matches!(output_format, OutputFormat::Markdown) {
                    table.with(Style::markdown());
                } else {
                    table.with(Style::rounded());
                }
                println!("{}", table);
            }
        }
        OutputFormat::Json => match serde_json::to_string(inspections) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        },
        OutputFormat::JsonPretty => match serde_json::to_string_pretty(inspections) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        },
        OutputFormat::Psv => {
            println!("database|table|rows|columns|timestamp_columns");
            for inspection in inspections {
                for t in &inspection.tables {
                    println!(
                        "{}|{}|{}|{}|{}",
                        inspection.path.display(),
                        t.table,
                        t.rows,
                        t.columns,
                        t.timestamp_columns.join(",")
                    );
                }
            }
        }
    }
}
