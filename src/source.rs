//! Newline-delimited JSON record source.

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::{BufRead, Lines};

/// Iterates the JSON records of an NDJSON stream, one per non-blank line.
///
/// Lines are parsed with simd-json; when that fails the line is re-parsed
/// with serde_json so the error names the real problem.
pub struct RecordReader<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        RecordReader {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// 1-based number of the last line read
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line.with_context(|| format!("Failed to read line {}", self.line_no)) {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Some(parse_line(line, self.line_no));
        }
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<Value> {
    let mut bytes = line.as_bytes().to_vec();
    match simd_json::serde::from_slice::<Value>(&mut bytes) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str(line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no)),
    }
}
