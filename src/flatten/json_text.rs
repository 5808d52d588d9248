//! JSON text encoding for values stored as strings in flat records.
//!
//! Downstream tabular consumers expect `{"width": 2, "length": 5}` with a space
//! after every `,` and `:`, so the compact serde_json formatter is not used here.

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::io;

/// serde_json formatter that writes `, ` and `: ` separators on one line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize a value to single-line JSON text with spaced separators
pub fn to_spaced_string<T: ?Sized + Serialize>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(<serde_json::Error as serde::ser::Error>::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_object_separators() {
        let text = to_spaced_string(&json!({"width": 2, "length": 5})).unwrap();
        assert_eq!(text, r#"{"width": 2, "length": 5}"#);
    }

    #[test]
    fn test_nested_parses_back() {
        let original = json!([{"lat": 1, "tags": ["a", "b"]}, {"lat": 2, "tags": []}]);
        let text = to_spaced_string(&original).unwrap();
        assert_eq!(text, r#"[{"lat": 1, "tags": ["a", "b"]}, {"lat": 2, "tags": []}]"#);

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_string_scalar_is_quoted() {
        assert_eq!(to_spaced_string(&json!("{\"a\": 1}")).unwrap(), r#""{\"a\": 1}""#);
    }
}
