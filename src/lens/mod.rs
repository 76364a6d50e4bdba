//! Lens module
//!
//! This module provides high-level "lens" abstractions that combine business logic
//! with output formatting, reusable from the CLI or from other programs.
//!
//! | Lens / module | Purpose |
//! |------|---------|
//! | `TimestampLens` | classify raw numbers into epoch conventions and convert them |
//! | `probe` | pick timestamp candidate columns by name |
//! | `ExportLens` | export whole databases, table by table, to delimited text |
//!
//! # Usage
//!
//! ```rust,ignore
//! // Timestamp classification
//! use sqlrescue::lens::timestamp::{ClassifyArgs, ClassifyMode, TimestampLens};
//!
//! // Database export
//! use sqlrescue::lens::export::{ExportArgs, ExportLens, ExportOptions};
//! ```

pub mod utils;

pub mod export;
pub mod probe;
pub mod timestamp;
