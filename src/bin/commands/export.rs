use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{anyhow, Result};
use clap::{ArgGroup, Args};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use sqlrescue::config::parse_delimiter;
use sqlrescue::lens::export::{DatabaseOutcome, ExportArgs, ExportLens, ExportOptions};
use sqlrescue::lens::utils::OutputFormat;
use sqlrescue::SqlrescueConfig;
use tracing::info;

/// Arguments for the Export command
#[derive(Args)]
#[clap(group(ArgGroup::new("source").required(true).args(["file", "folder"])))]
pub struct ExportCommandArgs {
    /// Single SQLite database file to export
    #[clap(long)]
    pub file: Option<PathBuf>,

    /// Folder to scan for SQLite databases
    #[clap(long)]
    pub folder: Option<PathBuf>,

    /// Scan the folder recursively
    #[clap(short, long, requires = "folder")]
    pub recursive: bool,

    /// Output directory (default from config, ./sqlite_exports)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Number of databases exported concurrently
    #[clap(short, long)]
    pub jobs: Option<usize>,

    /// Field delimiter: ",", "tab" or any single ASCII character
    #[clap(long)]
    pub delimiter: Option<String>,

    /// Show a progress bar
    #[clap(long)]
    pub progress: bool,

    #[clap(flatten)]
    pub export: ExportArgs,
}

pub fn run(
    config: &SqlrescueConfig,
    args: ExportCommandArgs,
    output_format: OutputFormat,
    shutdown: &AtomicBool,
) -> Result<()> {
    let ExportCommandArgs {
        file,
        folder,
        recursive,
        output,
        jobs,
        delimiter,
        progress,
        export,
    } = args;

    // command-line flags take precedence over the config file
    let mut options = ExportOptions::from_config(config);
    if let Some(output) = output {
        options.output_dir = output;
    }
    if let Some(jobs) = jobs {
        options.jobs = jobs.max(1);
    }
    if let Some(delimiter) = delimiter {
        options.delimiter = parse_delimiter(&delimiter)?;
    }

    let lens = ExportLens::new(options).map_err(|e| anyhow!("{}", e))?;
    let started = Instant::now();

    let pb = if progress {
        let sty = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} {wide_msg}",
        )
        .map_err(|e| anyhow!("Invalid progress template: {}", e))?
        .progress_chars("##-");
        let pb = ProgressBar::new(0);
        pb.set_style(sty);
        Some(pb)
    } else {
        None
    };

    let on_done = |outcome: &DatabaseOutcome| {
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(outcome.path.display().to_string());
        }
    };
    let on_found = |count: usize| {
        if let Some(pb) = &pb {
            pb.set_length(count as u64);
        }
    };

    let outcomes = match (file, folder) {
        (Some(file), _) => {
            on_found(1);
            lens.export_paths(&[file], &export, shutdown, &on_done)
        }
        (None, Some(folder)) => lens
            .export_folder(&folder, recursive, &export, shutdown, &on_found, &on_done)
            .map_err(|e| anyhow!("{}", e))?,
        (None, None) => return Err(anyhow!("either --file or --folder is required")),
    };

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let mut summary = lens.summary(Some(started.elapsed()));
    summary.interrupted = shutdown.load(Ordering::SeqCst);
    if summary.interrupted {
        info!("export interrupted, remaining databases were not started");
    }

    match output_format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let val = json!({
                "summary": summary,
                "databases": outcomes,
            });
            let out = if matches!(output_format, OutputFormat::JsonPretty) {
                serde_json::to_string_pretty(&val)?
            } else {
                val.to_string()
            };
            println!("{}", out);
        }
        _ => println!("{}", summary.render(&output_format)),
    }

    Ok(())
}
