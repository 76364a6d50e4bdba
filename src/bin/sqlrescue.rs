use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use sqlrescue::lens::timestamp::ClassifyArgs;
use sqlrescue::lens::utils::OutputFormat;
use sqlrescue::SqlrescueConfig;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::config::ConfigArgs;
use commands::export::ExportCommandArgs;
use commands::inspect::InspectArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.sqlrescue/sqlrescue.toml is used
    #[clap(short, long, global = true)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format for reports: table, markdown, json, json-pretty, psv
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Copy all log events into this file (overrides `log_file` in the config)
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export tables of one database file or of every database in a folder.
    Export(ExportCommandArgs),

    /// List tables, row counts and timestamp columns without exporting anything.
    Inspect(InspectArgs),

    /// Classify raw numbers into timestamp conventions and convert them.
    Classify(ClassifyArgs),

    /// Show the active configuration.
    Config(ConfigArgs),
}

fn init_logging(debug: bool, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| anyhow!("Unable to open log file {}: {}", path.display(), e))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Unable to initialize logging: {}", e))
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match SqlrescueConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| config.log_file.as_ref().map(PathBuf::from));
    let quiet = matches!(&cli.command, Commands::Export(args) if args.progress);
    if let Err(e) = init_logging(cli.debug, quiet, log_file) {
        eprintln!("ERROR: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Export(args) => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                eprintln!("\nInterrupt received, finishing databases in progress...");
                flag.store(true, Ordering::SeqCst);
            }) {
                tracing::warn!(error = %e, "failed to set interrupt handler");
            }
            commands::export::run(&config, args, cli.format, &shutdown)
        }
        Commands::Inspect(args) => commands::inspect::run(&config, args, cli.format),
        Commands::Classify(args) => {
            commands::classify::run(args, cli.format);
            Ok(())
        }
        Commands::Config(args) => {
            commands::config::run(&config, args, cli.format);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
