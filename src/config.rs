use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::lens::export::default_extensions;

pub struct SqlrescueConfig {
    /// Directory receiving exported files
    pub output_dir: String,

    /// How long to wait on a locked database before falling back, in milliseconds
    pub busy_timeout_ms: u64,

    /// Field delimiter of exported files
    pub delimiter: u8,

    /// Number of databases exported concurrently
    pub jobs: usize,

    /// Optional log file receiving a copy of all log events
    pub log_file: Option<String>,

    /// Parent directory for private copies of locked databases
    pub temp_dir: Option<String>,

    /// File extensions picked up when scanning folders
    pub extensions: Vec<String>,
}

const EMPTY_CONFIG: &str = r#"### sqlrescue configuration file

### directory receiving exported files
# output_dir = "./sqlite_exports"

### milliseconds to wait on a locked database before falling back to a copy
# busy_timeout_ms = 0

### field delimiter: "," (csv), "tab" (tsv) or any single character
# delimiter = ","

### number of databases exported concurrently
# jobs = 1

### copy all log events into this file
# log_file = "export_errors.log"

### parent directory for private copies of locked databases
# temp_dir = "/tmp"

### comma-separated file extensions picked up when scanning folders
# extensions = ".sqlite,.db,.sqlite3,.db3,.s3db,.sl3"
"#;

impl Default for SqlrescueConfig {
    fn default() -> Self {
        Self {
            output_dir: "./sqlite_exports".to_string(),
            busy_timeout_ms: 0,
            delimiter: b',',
            jobs: 1,
            log_file: None,
            temp_dir: None,
            extensions: default_extensions(),
        }
    }
}

impl SqlrescueConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<SqlrescueConfig> {
        let mut builder = Config::builder();

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                // By default use $HOME/.sqlrescue/sqlrescue.toml as the configuration file path
                let p = Self::config_file_path();
                let config_dir = Path::new(&p)
                    .parent()
                    .ok_or_else(|| anyhow!("Invalid config file path '{}'", p))?;
                std::fs::create_dir_all(config_dir)
                    .map_err(|e| anyhow!("Unable to create sqlrescue directory: {}", e))?;
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of SQLRESCUE)
        // E.g., `SQLRESCUE_OUTPUT_DIR=/cases/42 ./sqlrescue export ...`
        builder = builder.add_source(config::Environment::with_prefix("SQLRESCUE"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    /// Build a configuration from flat key/value settings
    pub fn from_map(config: &HashMap<String, String>) -> Result<SqlrescueConfig> {
        let defaults = SqlrescueConfig::default();

        let delimiter = match config.get("delimiter") {
            Some(d) => parse_delimiter(d)?,
            None => defaults.delimiter,
        };

        let jobs = match config.get("jobs") {
            Some(j) => j
                .parse::<usize>()
                .map_err(|e| anyhow!("Invalid jobs value '{}': {}", j, e))?
                .max(1),
            None => defaults.jobs,
        };

        let busy_timeout_ms = match config.get("busy_timeout_ms") {
            Some(t) => t
                .parse::<u64>()
                .map_err(|e| anyhow!("Invalid busy_timeout_ms value '{}': {}", t, e))?,
            None => defaults.busy_timeout_ms,
        };

        let extensions = match config.get("extensions") {
            Some(list) => list
                .split(',')
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .map(|e| {
                    if e.starts_with('.') {
                        e.to_string()
                    } else {
                        format!(".{}", e)
                    }
                })
                .collect(),
            None => defaults.extensions,
        };

        Ok(SqlrescueConfig {
            output_dir: config
                .get("output_dir")
                .cloned()
                .unwrap_or(defaults.output_dir),
            busy_timeout_ms,
            delimiter,
            jobs,
            log_file: config.get("log_file").cloned(),
            temp_dir: config.get("temp_dir").cloned(),
            extensions,
        })
    }

    /// Busy timeout as Duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let delimiter = match self.delimiter {
            b'\t' => "tab".to_string(),
            d => (d as char).to_string(),
        };
        let mut lines = vec![
            format!("Config File:        {}", Self::config_file_path()),
            format!("Output Directory:   {}", self.output_dir),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
            format!("Delimiter:          {}", delimiter),
            format!("Jobs:               {}", self.jobs),
            format!("Extensions:         {}", self.extensions.join(",")),
        ];
        if let Some(log_file) = &self.log_file {
            lines.push(format!("Log File:           {}", log_file));
        }
        if let Some(temp_dir) = &self.temp_dir {
            lines.push(format!("Temp Directory:     {}", temp_dir));
        }
        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.sqlrescue/sqlrescue.toml", home_dir)
    }
}

/// Parse a delimiter setting: `,`, `tab`/`\t`, or any single ASCII character
pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        "pipe" => Ok(b'|'),
        v if v.len() == 1 && v.is_ascii() && v != "\"" => Ok(v.as_bytes()[0]),
        v => Err(anyhow!(
            "Invalid delimiter '{}': expected a single ASCII character or 'tab'",
            v
        )),
    }
}
