use clap::Args;
use serde::Serialize;
use sqlrescue::lens::utils::OutputFormat;
use sqlrescue::SqlrescueConfig;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Show whether the configured directories exist
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    output_dir: String,
    busy_timeout_ms: u64,
    delimiter: String,
    jobs: usize,
    extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir_exists: Option<bool>,
}

pub fn run(config: &SqlrescueConfig, args: ConfigArgs, output_format: OutputFormat) {
    let ConfigArgs { verbose } = args;

    let info = ConfigInfo {
        config_file: SqlrescueConfig::config_file_path(),
        output_dir: config.output_dir.clone(),
        busy_timeout_ms: config.busy_timeout_ms,
        delimiter: match config.delimiter {
            b'\t' => "tab".to_string(),
            d => (d as char).to_string(),
        },
        jobs: config.jobs,
        extensions: config.extensions.clone(),
        log_file: config.log_file.clone(),
        temp_dir: config.temp_dir.clone(),
        output_dir_exists: verbose.then(|| Path::new(&config.output_dir).is_dir()),
    };

    match output_format {
        OutputFormat::Json => match serde_json::to_string(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        },
        OutputFormat::JsonPretty => match serde_json::to_string_pretty(&info) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
        },
        _ => {
            println!("{}", config.summary());
            if let Some(exists) = info.output_dir_exists {
                println!(
                    "Output Dir Exists:  {}",
                    if exists { "yes" } else { "no" }
                );
            }
        }
    }
}
