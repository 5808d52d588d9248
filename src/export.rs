//! Batch export of an hourly-partitioned record lake into numbered output files.

use crate::flatten::{CvFlattener, FlatRecord};
use crate::layout::hourly_prefixes;
use crate::providers::{MessageType, Provider};
use crate::sink::{CsvSink, NdjsonSink, RecordSink};
use crate::source::RecordReader;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());

pub const DEFAULT_OUTPUT_CONVENTION: &str = "{pilot}_{message_type}_{sdate}_{edate}";
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Flattened records as CSV
    #[default]
    Csv,
    /// Raw records as newline-delimited JSON
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "txt",
        }
    }
}

/// Configuration for an export run
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub provider: Provider,
    pub message_type: MessageType,
    /// Root of the partitioned layout
    pub input_root: PathBuf,
    pub output_dir: PathBuf,
    pub start: NaiveDateTime,
    /// Exclusive end hour; `start` + 24h when unset
    pub end: Option<NaiveDateTime>,
    /// File name template. Placeholders: `{pilot}`, `{message_type}`, `{sdate}`, `{edate}`
    pub output_convention: String,
    pub format: OutputFormat,
    /// Flush once more than this many records are pending after a folder
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Wydot,
            message_type: MessageType::Bsm,
            input_root: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            start: NaiveDateTime::default(),
            end: None,
            output_convention: DEFAULT_OUTPUT_CONVENTION.to_string(),
            format: OutputFormat::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ExportConfig {
    pub fn end(&self) -> NaiveDateTime {
        self.end.unwrap_or(self.start + Duration::hours(24))
    }

    /// Name of the `n`th output file, extension included
    pub fn output_name(&self, n: usize) -> String {
        let sdate = self.start.format("%Y%m%d%H").to_string();
        let edate = self.end().format("%Y%m%d%H").to_string();
        let stem = PLACEHOLDER_REGEX.replace_all(&self.output_convention, |caps: &Captures| {
            match &caps[1] {
                "pilot" => self.provider.as_str().to_string(),
                "message_type" => self.message_type.as_str().to_string(),
                "sdate" => sdate.clone(),
                "edate" => edate.clone(),
                _ => caps[0].to_string(),
            }
        });
        format!("{}_{}.{}", stem, n, self.format.extension())
    }
}

/// Totals for a finished export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub files_read: usize,
    pub records_written: usize,
    pub skipped: usize,
    pub outputs: Vec<PathBuf>,
}

/// Walks the hourly folders of one stream and writes batched output files
pub struct Exporter {
    config: ExportConfig,
    flattener: CvFlattener,
    pending: Vec<FlatRecord>,
    summary: ExportSummary,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        let flattener = CvFlattener::for_stream(config.provider, config.message_type);
        Self {
            config,
            flattener,
            pending: Vec::new(),
            summary: ExportSummary::default(),
        }
    }

    pub fn run(mut self) -> Result<ExportSummary> {
        let prefixes = hourly_prefixes(
            self.config.provider,
            self.config.message_type,
            self.config.start,
            self.config.end(),
        );
        info!(
            stream = %self.flattener.rules().name,
            hours = prefixes.len(),
            root = %self.config.input_root.display(),
            "starting export"
        );

        std::fs::create_dir_all(&self.config.output_dir).with_context(|| {
            format!("Failed to create output directory {}", self.config.output_dir.display())
        })?;

        for prefix in &prefixes {
            let folder = self.config.input_root.join(prefix);
            if !folder.is_dir() {
                debug!(folder = %prefix, "no data for hour");
                continue;
            }

            let files = list_files(&folder)?;
            info!(folder = %prefix, files = files.len(), "processing folder");
            for file in &files {
                self.read_file(file)?;
            }

            if self.pending.len() > self.config.batch_size {
                self.flush()?;
            }
        }

        if !self.pending.is_empty() {
            self.flush()?;
        }

        info!(
            files = self.summary.files_read,
            records = self.summary.records_written,
            skipped = self.summary.skipped,
            outputs = self.summary.outputs.len(),
            "export finished"
        );
        Ok(self.summary)
    }

    fn read_file(&mut self, path: &Path) -> Result<()> {
        debug!(file = %path.display(), "reading");
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        self.summary.files_read += 1;

        for record in RecordReader::new(BufReader::new(file)) {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unparseable line");
                    self.summary.skipped += 1;
                    continue;
                }
            };

            match self.config.format {
                OutputFormat::Csv => match self.flattener.process_and_split(record) {
                    Ok(records) => self.pending.extend(records),
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "skipping record");
                        self.summary.skipped += 1;
                    }
                },
                OutputFormat::Json => match record {
                    Value::Object(map) => self.pending.push(map),
                    _ => {
                        warn!(file = %path.display(), "skipping non-object record");
                        self.summary.skipped += 1;
                    }
                },
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let name = self.config.output_name(self.summary.outputs.len());
        let path = self.config.output_dir.join(name);
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let writer = BufWriter::new(file);

        let mut sink: Box<dyn RecordSink> = match self.config.format {
            OutputFormat::Csv => Box::new(CsvSink::new(writer)),
            OutputFormat::Json => Box::new(NdjsonSink::new(writer)),
        };
        sink.write_batch(&self.pending)?;
        sink.flush()?;

        info!(records = self.pending.len(), path = %path.display(), "wrote batch");
        self.summary.records_written += self.pending.len();
        self.summary.outputs.push(path);
        self.pending.clear();
        Ok(())
    }
}

/// Regular files directly inside `dir`, sorted by name
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::parse_date_hour;
    use std::fs;

    fn spat_line(id: u64) -> String {
        format!(
            "{{\"payload\": {{\"data\": {{\"SPAT\": {{\"intersections\": {{\"IntersectionState\": \
             {{\"id\": {{\"id\": {}}}, \"states\": {{\"MovementState\": [{{\"signalGroup\": 1}}]}}}}}}}}}}}}}}\n",
            id
        )
    }

    fn write_hour(root: &Path, hour: &str, name: &str, content: &str) {
        let dir = root.join(hour);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    fn config(root: &Path, out: &Path, format: OutputFormat) -> ExportConfig {
        ExportConfig {
            provider: Provider::Thea,
            message_type: MessageType::Spat,
            input_root: root.to_path_buf(),
            output_dir: out.to_path_buf(),
            start: parse_date_hour("2020-03-01").unwrap(),
            format,
            batch_size: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_output_name() {
        let config = ExportConfig {
            provider: Provider::Wydot,
            message_type: MessageType::Tim,
            start: parse_date_hour("2020-03-01T05").unwrap(),
            ..Default::default()
        };
        assert_eq!(config.output_name(0), "wydot_tim_2020030105_2020030205_0.csv");

        let config = ExportConfig {
            output_convention: "{pilot}-{unknown}".to_string(),
            format: OutputFormat::Json,
            ..config
        };
        assert_eq!(config.output_name(3), "wydot-{unknown}_3.txt");
    }

    #[test]
    fn test_export_csv_batches() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let first: String = (1..=3).map(spat_line).collect();
        write_hour(root.path(), "thea/SPAT/2020/03/01/00", "a.json", &first);
        let second = format!("{}not json\n{}", spat_line(4), spat_line(5));
        write_hour(root.path(), "thea/SPAT/2020/03/01/01", "b.json", &second);
        write_hour(root.path(), "thea/SPAT/2020/03/02/00", "late.json", &spat_line(6));

        let summary = Exporter::new(config(root.path(), out.path(), OutputFormat::Csv))
            .run()
            .unwrap();

        assert_eq!(summary.files_read, 2);
        assert_eq!(summary.records_written, 5);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.outputs,
            vec![
                out.path().join("thea_spat_2020030100_2020030200_0.csv"),
                out.path().join("thea_spat_2020030100_2020030200_1.csv"),
            ]
        );

        let batch = fs::read_to_string(&summary.outputs[0]).unwrap();
        let lines: Vec<_> = batch.lines().collect();
        assert_eq!(lines[0], "payload_data_SPAT_intersections_IntersectionState_id_id,MovementState");
        assert_eq!(lines[1], "1,\"[{\"\"signalGroup\"\": 1}]\"");
        assert_eq!(lines.len(), 4);

        let rest = fs::read_to_string(&summary.outputs[1]).unwrap();
        assert_eq!(rest.lines().count(), 3);
    }

    #[test]
    fn test_export_json_passthrough() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_hour(root.path(), "thea/SPAT/2020/03/01/12", "a.json", "{\"b\": 1, \"a\": {\"x\": 2}}\n[1, 2]\n");

        let summary = Exporter::new(config(root.path(), out.path(), OutputFormat::Json))
            .run()
            .unwrap();

        assert_eq!(summary.records_written, 1);
        assert_eq!(summary.skipped, 1);
        let written = fs::read_to_string(&summary.outputs[0]).unwrap();
        assert_eq!(written, "{\"b\":1,\"a\":{\"x\":2}}\n");
    }

    #[test]
    fn test_export_empty_range_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let summary = Exporter::new(config(root.path(), out.path(), OutputFormat::Csv))
            .run()
            .unwrap();
        assert_eq!(summary, ExportSummary::default());
    }
}
