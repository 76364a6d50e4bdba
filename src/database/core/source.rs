//! Query engine capability
//!
//! The export pipeline only needs three things from a query engine: the list of
//! user tables, the column layout of a table, and a cursor over its rows. This
//! module defines that capability as the [`TableSource`] trait, along with the
//! engine-neutral value and column types it yields.

use std::ops::ControlFlow;

use crate::error::ExportResult;

/// A scalar read from a database cell
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Integer(i64),
    Real(f64),
    /// UTF-8 text; invalid byte sequences were replaced when read
    Text(String),
    Blob(Vec<u8>),
}

impl RawValue {
    /// Numeric interpretation used by timestamp classification
    ///
    /// Integers and reals are taken as is, text is parsed after trimming
    /// whitespace. Null and blobs have no numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Integer(i) => Some(*i as f64),
            RawValue::Real(r) => Some(*r),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            RawValue::Null | RawValue::Blob(_) => None,
        }
    }

    /// Render the value as an output field
    pub fn to_field(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Integer(i) => i.to_string(),
            RawValue::Real(r) => format_real(*r),
            RawValue::Text(s) => s.clone(),
            RawValue::Blob(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for RawValue {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;

        match value {
            ValueRef::Null => RawValue::Null,
            ValueRef::Integer(i) => RawValue::Integer(i),
            ValueRef::Real(r) => RawValue::Real(r),
            ValueRef::Text(t) => RawValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => RawValue::Blob(b.to_vec()),
        }
    }
}

/// Integral reals keep a trailing `.0` so they stay distinguishable from integers
fn format_real(r: f64) -> String {
    let text = r.to_string();
    if r.is_finite() && r.fract() == 0.0 && !text.contains(['.', 'e']) {
        format!("{}.0", text)
    } else {
        text
    }
}

/// Column metadata as declared in the table definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Zero-based position in the table definition
    pub ordinal: usize,
    pub name: String,
    /// Declared type, empty when the column has none
    pub declared_type: String,
}

/// One result row, cells in result-column order
pub type Row = Vec<RawValue>;

/// Capability set the exporter requires from an embedded query engine
pub trait TableSource {
    /// User tables in definition order, excluding the engine's catalog tables
    fn list_tables(&self) -> ExportResult<Vec<String>>;

    /// Column metadata of a table
    fn table_columns(&self, table: &str) -> ExportResult<Vec<ColumnInfo>>;

    /// Column names as returned by `SELECT *` on the table, without reading rows
    fn result_columns(&self, table: &str) -> ExportResult<Vec<String>>;

    /// Number of rows in a table
    fn row_count(&self, table: &str) -> ExportResult<u64>;

    /// Stream all rows of a table in slices of at most `batch_size` rows
    ///
    /// `row_limit` is applied in the query itself. The visitor may return
    /// `ControlFlow::Break` to stop reading before the cursor is exhausted.
    fn for_each_batch(
        &self,
        table: &str,
        row_limit: Option<u64>,
        batch_size: usize,
        visitor: &mut dyn FnMut(&[Row]) -> ExportResult<ControlFlow<()>>,
    ) -> ExportResult<()>;
}

/// Quote an identifier for interpolation into SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
