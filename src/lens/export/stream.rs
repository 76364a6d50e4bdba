//! Table streaming
//!
//! Streams every row of one table to a [`RowSink`] in bounded batches, appending
//! a converted timestamp and a convention tag for each timestamp candidate.
//! Memory use depends on [`BATCH_SIZE`], never on the size of the table.
//!
//! The row shape is fixed by the header: `original columns` followed by
//! `<name>_converted, <name>_type` per candidate. A row whose cell count does not
//! match the probed columns aborts the table instead of being written skewed.

use std::io::Write;
use std::ops::ControlFlow;

use crate::database::TableSource;
use crate::error::{ExportError, ExportResult};
use crate::lens::probe::{probe_table, TimestampCandidate};
use crate::lens::timestamp::{classify, ClassifyMode};

/// Rows fetched from the cursor per batch
pub const BATCH_SIZE: usize = 1000;

/// Destination of exported rows
pub trait RowSink {
    fn write_row(&mut self, fields: &[String]) -> ExportResult<()>;

    fn flush(&mut self) -> ExportResult<()> {
        Ok(())
    }
}

impl<W: Write> RowSink for csv::Writer<W> {
    fn write_row(&mut self, fields: &[String]) -> ExportResult<()> {
        self.write_record(fields)?;
        Ok(())
    }

    fn flush(&mut self) -> ExportResult<()> {
        csv::Writer::flush(self)?;
        Ok(())
    }
}

impl RowSink for Vec<Vec<String>> {
    fn write_row(&mut self, fields: &[String]) -> ExportResult<()> {
        self.push(fields.to_vec());
        Ok(())
    }
}

/// Header of an export: original columns, then two derived fields per candidate
pub fn export_header(original_columns: &[String], candidates: &[TimestampCandidate]) -> Vec<String> {
    let mut header = original_columns.to_vec();
    for candidate in candidates {
        header.push(format!("{}_converted", candidate.name));
        header.push(format!("{}_type", candidate.name));
    }
    header
}

/// Stream one table into a sink, returning the number of data rows written
///
/// `candidate_override` replaces name-based detection when given. `row_limit`
/// is passed to the query and also enforced while writing.
pub fn stream_table<S, K>(
    source: &S,
    table: &str,
    sink: &mut K,
    row_limit: Option<u64>,
    candidate_override: Option<&[String]>,
) -> ExportResult<u64>
where
    S: TableSource + ?Sized,
    K: RowSink + ?Sized,
{
    let candidate_names = match candidate_override {
        Some(names) => names.to_vec(),
        None => probe_table(source, table),
    };

    let original_columns = source
        .result_columns(table)
        .map_err(|e| in_table(table, e))?;
    let candidates = TimestampCandidate::resolve(&candidate_names, &original_columns);
    let header = export_header(&original_columns, &candidates);
    sink.write_row(&header)?;

    let expected_cells = original_columns.len();
    let mut written: u64 = 0;
    let mut fields: Vec<String> = Vec::with_capacity(header.len());

    source
        .for_each_batch(table, row_limit, BATCH_SIZE, &mut |batch| {
            for row in batch {
                if row_limit.is_some_and(|limit| written >= limit) {
                    return Ok(ControlFlow::Break(()));
                }
                if row.len() != expected_cells {
                    return Err(ExportError::table(
                        table,
                        format!(
                            "row {} has {} fields, expected {}",
                            written + 1,
                            row.len(),
                            expected_cells
                        ),
                    ));
                }

                fields.clear();
                fields.extend(row.iter().map(|cell| cell.to_field()));
                for candidate in &candidates {
                    let result = classify(&row[candidate.position], ClassifyMode::Auto);
                    fields.push(result.timestamp.unwrap_or_default());
                    fields.push(result.convention.tag().to_string());
                }
                sink.write_row(&fields)?;
                written += 1;
            }

            if row_limit.is_some_and(|limit| written >= limit) {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        })
        .map_err(|e| in_table(table, e))?;

    sink.flush()?;
    Ok(written)
}

fn in_table(table: &str, err: ExportError) -> ExportError {
    match err {
        ExportError::TableExport { .. } => err,
        other => ExportError::table(table, other),
    }
}
