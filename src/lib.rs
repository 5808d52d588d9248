//! # cvflat - Connected-Vehicle Telemetry Flattener
//!
//! Turns deeply nested connected-vehicle messages (BSM, TIM, SPaT) from the
//! WYDOT and THEA pilots into flat, column-oriented records suitable for
//! tabular storage.
//!
//! ## Modules
//!
//! - **flatten**: the generic engine (flatten, rename, coerce, split, post-process)
//! - **providers**: built-in rule sets, one per (provider, message type) stream
//! - **source** / **sink**: NDJSON input, CSV and NDJSON output
//! - **layout** / **export**: hourly-partitioned batch export
//!
//! ## Quick Start
//!
//! ```rust
//! use cvflat::{CvFlattener, MessageType, Provider};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let record = json!({
//!     "payload": {"data": {"SPAT": {"intersections": {"IntersectionState": {
//!         "states": {"MovementState": [{"signalGroup": 2}]}
//!     }}}}}
//! });
//!
//! let flattener = CvFlattener::for_stream(Provider::Thea, MessageType::Spat);
//! let rows = flattener.process_and_split(record)?;
//!
//! assert_eq!(rows[0]["MovementState"], r#"[{"signalGroup": 2}]"#);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::io::BufRead;
use tracing::warn;

pub mod error;
pub mod export;
pub mod flatten;
pub mod layout;
pub mod providers;
pub mod sink;
pub mod source;

// Re-export commonly used types for convenience
pub use error::{FlattenError, StreamError};
pub use export::{ExportConfig, ExportSummary, Exporter, OutputFormat};
pub use flatten::{CvFlattener, FlatRecord, RuleSet, SplitOutcome};
pub use providers::{MessageType, Provider};
pub use sink::{CsvSink, NdjsonSink, RecordSink};
pub use source::RecordReader;

/// Counts for one pass over a record stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub records_written: usize,
    pub skipped: usize,
}

/// Main entry point: flatten an NDJSON stream of raw records into a sink.
///
/// Unparseable lines and records that fail to flatten are logged and
/// skipped. Only sink failures abort the stream.
pub fn flatten_stream<R: BufRead>(
    reader: R,
    flattener: &CvFlattener,
    sink: &mut dyn RecordSink,
) -> Result<StreamSummary> {
    let mut records = RecordReader::new(reader);
    let mut summary = StreamSummary::default();

    while let Some(value) = records.next() {
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "skipping unparseable line");
                summary.skipped += 1;
                continue;
            }
        };

        match flattener.process_and_split(value) {
            Ok(rows) => {
                summary.records_written += rows.len();
                sink.write_batch(&rows)?;
            }
            Err(e) => {
                warn!(line = records.line_no(), error = %e, "skipping record");
                summary.skipped += 1;
            }
        }
    }

    sink.flush()?;
    Ok(summary)
}
