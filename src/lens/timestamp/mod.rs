//! Timestamp classification lens
//!
//! Raw numbers in application databases encode time in several incompatible
//! (epoch, unit) conventions. This module decides which convention a number most
//! likely uses and converts it to a calendar timestamp.
//!
//! | tag | epoch | unit |
//! |---|---|---|
//! | `webkit` | 1601-01-01 | microseconds |
//! | `unix` | 1970-01-01 | seconds |
//! | `unix_ms` | 1970-01-01 | milliseconds |
//! | `cocoa` | 2001-01-01 | seconds |
//!
//! In [`ClassifyMode::Auto`] the convention is chosen purely by magnitude, first
//! match wins:
//!
//! 1. `> 1e18` → webkit
//! 2. `> 1e10` → unix_ms
//! 3. `> 1e9` → unix
//! 4. `> 1e8` → cocoa
//! 5. otherwise unknown
//!
//! Timestamps are rendered in UTC as `YYYY-MM-DDTHH:MM:SS` followed by a
//! fractional part only when it is non-zero. Years outside 0000-9999 carry an
//! explicit sign. Classification never fails: null, non-numeric and
//! unrepresentable inputs all yield an unknown result.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlrescue::lens::timestamp::{ClassifyMode, TimestampLens};
//! use sqlrescue::database::RawValue;
//!
//! let lens = TimestampLens::new();
//! let result = lens.classify(&RawValue::Integer(1609459200), ClassifyMode::Auto);
//! assert_eq!(result.timestamp.as_deref(), Some("2021-01-01T00:00:00"));
//! ```

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::RawValue;
use crate::lens::utils::OutputFormat;

// =============================================================================
// Types
// =============================================================================

/// Epoch convention a value was interpreted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convention {
    /// Microseconds since 1601-01-01 (Chromium, Windows FILETIME/10)
    Webkit,
    /// Seconds since 1970-01-01
    Unix,
    /// Milliseconds since 1970-01-01
    UnixMs,
    /// Seconds since 2001-01-01 (Apple Core Data / Cocoa)
    Cocoa,
    /// No convention applied
    Unknown,
}

impl Convention {
    /// Tag written to the `<column>_type` output field
    pub fn tag(&self) -> &'static str {
        match self {
            Convention::Webkit => "webkit",
            Convention::Unix => "unix",
            Convention::UnixMs => "unix_ms",
            Convention::Cocoa => "cocoa",
            Convention::Unknown => "unknown",
        }
    }

    fn epoch(&self) -> Option<NaiveDateTime> {
        let (y, m, d) = match self {
            Convention::Webkit => (1601, 1, 1),
            Convention::Unix | Convention::UnixMs => (1970, 1, 1),
            Convention::Cocoa => (2001, 1, 1),
            Convention::Unknown => return None,
        };
        NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)
    }

    fn micros_per_unit(&self) -> i64 {
        match self {
            Convention::Webkit => 1,
            Convention::UnixMs => 1_000,
            Convention::Unix | Convention::Cocoa => 1_000_000,
            Convention::Unknown => 0,
        }
    }

    /// Pick a convention from the magnitude of a value
    pub fn detect(value: f64) -> Convention {
        if value > 1e18 {
            Convention::Webkit
        } else if value > 1e10 {
            Convention::UnixMs
        } else if value > 1e9 {
            Convention::Unix
        } else if value > 1e8 {
            Convention::Cocoa
        } else {
            Convention::Unknown
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// How to choose the convention for a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ClassifyMode {
    /// Infer the convention from magnitude (default)
    #[default]
    Auto,
    Webkit,
    Unix,
    UnixMs,
    Cocoa,
}

impl ClassifyMode {
    fn forced(&self) -> Option<Convention> {
        match self {
            ClassifyMode::Auto => None,
            ClassifyMode::Webkit => Some(Convention::Webkit),
            ClassifyMode::Unix => Some(Convention::Unix),
            ClassifyMode::UnixMs => Some(Convention::UnixMs),
            ClassifyMode::Cocoa => Some(Convention::Cocoa),
        }
    }
}

impl FromStr for ClassifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "webkit" | "chrome" => Ok(Self::Webkit),
            "unix" => Ok(Self::Unix),
            "unix_ms" | "unix-ms" => Ok(Self::UnixMs),
            "cocoa" | "apple" => Ok(Self::Cocoa),
            _ => Err(format!(
                "Unknown timestamp mode '{}'. Valid modes: auto, webkit, unix, unix_ms, cocoa",
                s
            )),
        }
    }
}

/// Outcome of classifying one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// ISO-8601 timestamp, `None` when no conversion applied
    pub timestamp: Option<String>,
    pub convention: Convention,
}

impl ConversionResult {
    pub fn unknown() -> Self {
        ConversionResult {
            timestamp: None,
            convention: Convention::Unknown,
        }
    }
}

/// Numeric reading of a cell, kept integral when possible so that large
/// microsecond counts convert without rounding
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn from_raw(value: &RawValue) -> Option<Self> {
        match value {
            RawValue::Integer(i) => Some(Numeric::Int(*i)),
            RawValue::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => Some(Numeric::Int(i)),
                Err(_) => value.as_f64().map(Numeric::Float),
            },
            _ => value.as_f64().map(Numeric::Float),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(i) => *i as f64,
            Numeric::Float(f) => *f,
        }
    }

    fn to_micros(self, per_unit: i64) -> Option<i64> {
        match self {
            Numeric::Int(i) => i.checked_mul(per_unit),
            Numeric::Float(f) => {
                let micros = (f * per_unit as f64).round();
                // i64::MAX is not exactly representable; stay strictly below 2^63
                if micros.is_finite() && micros.abs() < 9.2e18 {
                    Some(micros as i64)
                } else {
                    None
                }
            }
        }
    }
}

fn convert(value: Numeric, convention: Convention) -> Option<String> {
    let epoch = convention.epoch()?;
    let micros = value.to_micros(convention.micros_per_unit())?;
    let converted = epoch.checked_add_signed(TimeDelta::microseconds(micros))?;
    Some(converted.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

/// Classify a raw cell value and convert it to a timestamp
pub fn classify(value: &RawValue, mode: ClassifyMode) -> ConversionResult {
    let numeric = match Numeric::from_raw(value) {
        Some(n) => n,
        None => return ConversionResult::unknown(),
    };

    let convention = match mode.forced() {
        Some(c) => c,
        None => Convention::detect(numeric.as_f64()),
    };

    match convert(numeric, convention) {
        Some(timestamp) => ConversionResult {
            timestamp: Some(timestamp),
            convention,
        },
        None => ConversionResult::unknown(),
    }
}

// =============================================================================
// Args
// =============================================================================

/// Arguments for classifying ad-hoc values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ClassifyArgs {
    /// Raw values to classify
    #[cfg_attr(feature = "cli", clap(value_name = "VALUE", required = true))]
    pub values: Vec<String>,

    /// Force a convention instead of detecting it
    #[cfg_attr(feature = "cli", clap(short, long, value_enum, default_value = "auto"))]
    #[serde(default)]
    pub mode: ClassifyMode,
}

impl ClassifyArgs {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            mode: ClassifyMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ClassifyMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One classified input value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct ClassifiedValue {
    pub input: String,
    #[cfg_attr(feature = "display", tabled(display = "display_converted"))]
    pub converted: Option<String>,
    pub convention: Convention,
}

#[cfg(feature = "display")]
fn display_converted(converted: &Option<String>) -> String {
    converted.clone().unwrap_or_else(|| "-".to_string())
}

// =============================================================================
// Lens
// =============================================================================

/// Timestamp classification lens
pub struct TimestampLens;

impl TimestampLens {
    pub fn new() -> Self {
        Self
    }

    /// Classify a cell value
    pub fn classify(&self, value: &RawValue, mode: ClassifyMode) -> ConversionResult {
        classify(value, mode)
    }

    /// Classify command-line style string inputs
    pub fn classify_args(&self, args: &ClassifyArgs) -> Vec<ClassifiedValue> {
        args.values
            .iter()
            .map(|input| {
                let result = classify(&RawValue::Text(input.clone()), args.mode);
                ClassifiedValue {
                    input: input.clone(),
                    converted: result.timestamp,
                    convention: result.convention,
                }
            })
            .collect()
    }

    /// Format results based on output format
    pub fn format_results(&self, results: &[ClassifiedValue], format: &OutputFormat) -> String {
        match format {
            OutputFormat::Table | OutputFormat::Markdown => {
                #[cfg(feature = "display")]
                {
                    use tabled::settings::Style;
                    use tabled::Table;
                    let mut table = Table::new(results);
                    if matches!(format, OutputFormat::Markdown) {
                        table.with(Style::markdown());
                    } else {
                        table.with(Style::rounded());
                    }
                    table.to_string()
                }
                #[cfg(not(feature = "display"))]
                {
                    serde_json::to_string_pretty(results).unwrap_or_default()
                }
            }
            OutputFormat::Json => serde_json::to_string(results).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(results).unwrap_or_default(),
            OutputFormat::Psv => {
                let mut lines = vec!["input|converted|convention".to_string()];
                for r in results {
                    lines.push(format!(
                        "{}|{}|{}",
                        r.input,
                        r.converted.as_deref().unwrap_or(""),
                        r.convention
                    ));
                }
                lines.join("\n")
            }
        }
    }
}

impl Default for TimestampLens {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
