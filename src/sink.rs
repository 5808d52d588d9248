//! Record sinks: tabular CSV and newline-delimited JSON.

use crate::flatten::FlatRecord;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;

/// Destination for flat records
pub trait RecordSink {
    /// Accept a batch of records
    fn write_batch(&mut self, records: &[FlatRecord]) -> Result<()>;

    /// Write out anything buffered
    fn flush(&mut self) -> Result<()>;
}

/// Writes newline-delimited JSON, one record per line
pub struct NdjsonSink<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        NdjsonSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for NdjsonSink<W> {
    fn write_batch(&mut self, records: &[FlatRecord]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)
                .context("Failed to serialize record")?;
            writeln!(self.writer).context("Failed to write record")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}

/// Buffers records and writes them as one CSV table on flush.
///
/// The header is the union of all keys in the buffered records, in
/// first-seen order. Missing cells are left empty.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    pending: Vec<FlatRecord>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        CsvSink {
            writer: csv::Writer::from_writer(writer),
            pending: Vec::new(),
        }
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV writer: {}", e.error()))
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write_batch(&mut self, records: &[FlatRecord]) -> Result<()> {
        self.pending.extend_from_slice(records);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let columns = union_columns(&self.pending);
        self.writer
            .write_record(&columns)
            .context("Failed to write CSV header")?;

        for record in self.pending.drain(..) {
            let row = columns
                .iter()
                .map(|column| record.get(column).map(cell).unwrap_or_default());
            self.writer
                .write_record(row)
                .context("Failed to write CSV row")?;
        }

        self.writer.flush().context("Failed to flush CSV writer")
    }
}

/// All keys across `records`, in first-seen order
pub fn union_columns(records: &[FlatRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for key in records.iter().flat_map(|r| r.keys()) {
        if seen.insert(key.as_str()) {
            columns.push(key.clone());
        }
    }
    columns
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
