//! Message-type-specific post-processing on a flat record.
//!
//! Every step is guarded by an existence check: when the fields it reads are
//! absent the step does nothing.

use crate::error::{FlattenError, Result};
use crate::flatten::engine::{parse_float, parse_int};
use crate::flatten::json_text::to_spaced_string;
use crate::flatten::types::FlatRecord;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Scale for fixed-point J2735 coordinates (1/10 micro degree)
pub const MICRODEGREE_SCALE: f64 = 10_000_000.0;

/// Timestamps are read from at most this many leading characters
pub const TIMESTAMP_WIDTH: usize = 23;

static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})(?:\.(\d+))?").unwrap()
});

/// One named post-processing operation
#[derive(Debug, Clone, PartialEq)]
pub enum PostStep {
    /// Compose `POINT (<long> <lat>)` from separate coordinate fields
    GeoPoint {
        lat: String,
        long: String,
        target: String,
        /// Divide both coordinates by this before formatting
        scale: Option<f64>,
        drop_source: bool,
    },

    /// Pack width/length integers into a JSON-string `{"width": w, "length": l}`
    PackSize {
        width: String,
        length: String,
        target: String,
    },

    /// Spread a positional flag array (or bit string) into named booleans
    UnpackFlags { source: String, names: Vec<String> },

    /// Rewrite a timestamp as `%Y-%m-%dT%H:%M:%S%.3f`
    NormalizeTimestamp { key: String },
}

impl PostStep {
    pub fn geo_point(lat: &str, long: &str, target: &str) -> Self {
        PostStep::GeoPoint {
            lat: lat.to_string(),
            long: long.to_string(),
            target: target.to_string(),
            scale: None,
            drop_source: false,
        }
    }

    pub fn scaled_geo_point(lat: &str, long: &str, target: &str, scale: f64) -> Self {
        PostStep::GeoPoint {
            lat: lat.to_string(),
            long: long.to_string(),
            target: target.to_string(),
            scale: Some(scale),
            drop_source: false,
        }
    }

    pub fn pack_size(width: &str, length: &str, target: &str) -> Self {
        PostStep::PackSize {
            width: width.to_string(),
            length: length.to_string(),
            target: target.to_string(),
        }
    }

    /// Unpack `source` into `<source>_<suffix>` fields, one per position
    pub fn unpack_flags(source: &str, suffixes: &[&str]) -> Self {
        PostStep::UnpackFlags {
            source: source.to_string(),
            names: suffixes
                .iter()
                .map(|suffix| format!("{}_{}", source, suffix))
                .collect(),
        }
    }

    pub fn normalize_timestamp(key: &str) -> Self {
        PostStep::NormalizeTimestamp { key: key.to_string() }
    }

    pub fn apply(&self, out: &mut FlatRecord) -> Result<()> {
        match self {
            PostStep::GeoPoint {
                lat,
                long,
                target,
                scale,
                drop_source,
            } => {
                let (Some(lat_value), Some(long_value)) = (present(out, lat), present(out, long)) else {
                    return Ok(());
                };
                let point = match scale {
                    Some(scale) => format!(
                        "POINT ({} {})",
                        format_coordinate(scaled(long, long_value, *scale)?),
                        format_coordinate(scaled(lat, lat_value, *scale)?)
                    ),
                    None => format!("POINT ({} {})", raw_text(long_value), raw_text(lat_value)),
                };
                if *drop_source {
                    out.shift_remove(lat);
                    out.shift_remove(long);
                }
                out.insert(target.clone(), Value::String(point));
            }
            PostStep::PackSize { width, length, target } => {
                let (Some(width_value), Some(length_value)) = (present(out, width), present(out, length)) else {
                    return Ok(());
                };
                let size = json!({
                    "width": strict_int(width, width_value)?,
                    "length": strict_int(length, length_value)?,
                });
                out.insert(target.clone(), Value::String(to_spaced_string(&size)?));
                out.shift_remove(width);
                out.shift_remove(length);
            }
            PostStep::UnpackFlags { source, names } => {
                let Some(flags) = present(out, source).map(flag_values) else {
                    return Ok(());
                };
                for (name, flag) in names.iter().zip(flags) {
                    out.insert(name.clone(), flag);
                }
                out.shift_remove(source);
            }
            PostStep::NormalizeTimestamp { key } => {
                let Some(value) = present(out, key) else {
                    return Ok(());
                };
                let text = value
                    .as_str()
                    .and_then(normalize_timestamp)
                    .ok_or_else(|| FlattenError::Timestamp {
                        key: key.clone(),
                        value: value.to_string(),
                    })?;
                out.insert(key.clone(), Value::String(text));
            }
        }
        Ok(())
    }
}

/// A field that exists and is not null
fn present<'a>(out: &'a FlatRecord, key: &str) -> Option<&'a Value> {
    out.get(key).filter(|v| !v.is_null())
}

fn scaled(key: &str, value: &Value, scale: f64) -> Result<f64> {
    parse_float(value)
        .map(|f| f / scale)
        .ok_or_else(|| FlattenError::FloatCoercion {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn strict_int(key: &str, value: &Value) -> Result<i64> {
    parse_int(value).ok_or_else(|| FlattenError::IntCoercion {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Shortest round-trip text in the usual float notation: integral values keep
/// a `.0`, and magnitudes below 1e-4 or from 1e16 up use an exponent with at
/// least two digits (`1e-07`, `1.5e+16`).
fn format_coordinate(value: f64) -> String {
    let magnitude = value.abs();
    if value != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let text = format!("{:e}", value);
        return match text.split_once('e') {
            Some((mantissa, exponent)) => match exponent.strip_prefix('-') {
                Some(digits) => format!("{}e-{:0>2}", mantissa, digits),
                None => format!("{}e+{:0>2}", mantissa, exponent),
            },
            None => text,
        };
    }
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn flag_values(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().map(flag).collect(),
        Value::String(bits) => bits.chars().map(|c| Value::Bool(c == '1')).collect(),
        _ => Vec::new(),
    }
}

fn flag(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Value::Bool(true),
            "0" | "false" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

/// Reparse an ISO-8601-like timestamp, reading at most [`TIMESTAMP_WIDTH`]
/// characters, into millisecond precision.
pub fn normalize_timestamp(text: &str) -> Option<String> {
    let head = text.get(..TIMESTAMP_WIDTH).unwrap_or(text);
    let caps = TIMESTAMP_REGEX.captures(head)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let date = NaiveDate::from_ymd_opt(field(1)? as i32, field(2)?, field(3)?)?;
    let nanos = match caps.get(7) {
        Some(m) => {
            let digits: String = m.as_str().chars().chain(std::iter::repeat('0')).take(9).collect();
            digits.parse::<u32>().ok()?
        }
        None => 0,
    };
    let time = NaiveTime::from_hms_nano_opt(field(4)?, field(5)?, field(6)?, nanos)?;

    Some(
        NaiveDateTime::new(date, time)
            .format("%Y-%m-%dT%H:%M:%S%.3f")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> FlatRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_scaled_geo_point() {
        let mut out = record(json!({"lat": 384000000, "long": -1224190000}));
        PostStep::scaled_geo_point("lat", "long", "position", MICRODEGREE_SCALE)
            .apply(&mut out)
            .unwrap();
        assert_eq!(out.get("position").unwrap(), "POINT (-122.419 38.4)");
        assert!(out.contains_key("lat"));
    }

    #[test]
    fn test_coordinate_text_forms() {
        assert_eq!(format_coordinate(38.4), "38.4");
        assert_eq!(format_coordinate(-105.0), "-105.0");
        assert_eq!(format_coordinate(0.0), "0.0");
        assert_eq!(format_coordinate(0.0001), "0.0001");
        assert_eq!(format_coordinate(1e-7), "1e-07");
        assert_eq!(format_coordinate(-2.5e-5), "-2.5e-05");
        assert_eq!(format_coordinate(1.5e16), "1.5e+16");
    }

    #[test]
    fn test_scaled_geo_point_tiny_offset() {
        let mut out = record(json!({"lat": 1, "long": 0}));
        PostStep::scaled_geo_point("lat", "long", "position", MICRODEGREE_SCALE)
            .apply(&mut out)
            .unwrap();
        assert_eq!(out.get("position").unwrap(), "POINT (0.0 1e-07)");
    }

    #[test]
    fn test_geo_point_from_strings_drops_source() {
        let mut out = record(json!({"lat": "419000000", "long": "-1050000000"}));
        let step = PostStep::GeoPoint {
            lat: "lat".into(),
            long: "long".into(),
            target: "position".into(),
            scale: Some(MICRODEGREE_SCALE),
            drop_source: true,
        };
        step.apply(&mut out).unwrap();
        assert_eq!(out.get("position").unwrap(), "POINT (-105.0 41.9)");
        assert!(!out.contains_key("lat"));
        assert!(!out.contains_key("long"));
    }

    #[test]
    fn test_unscaled_geo_point_keeps_text() {
        let mut out = record(json!({"lat": 41.1144, "long": "-104.8505"}));
        PostStep::geo_point("lat", "long", "position").apply(&mut out).unwrap();
        assert_eq!(out.get("position").unwrap(), "POINT (-104.8505 41.1144)");
    }

    #[test]
    fn test_geo_point_skipped_when_missing() {
        let mut out = record(json!({"lat": 1}));
        PostStep::geo_point("lat", "long", "position").apply(&mut out).unwrap();
        assert!(!out.contains_key("position"));
    }

    #[test]
    fn test_geo_point_rejects_non_numeric() {
        let mut out = record(json!({"lat": "north", "long": 1}));
        let err = PostStep::scaled_geo_point("lat", "long", "position", MICRODEGREE_SCALE)
            .apply(&mut out)
            .unwrap_err();
        assert!(matches!(err, FlattenError::FloatCoercion { .. }));
    }

    #[test]
    fn test_pack_size() {
        let mut out = record(json!({"size_width": "200", "size_length": 500, "other": 1}));
        PostStep::pack_size("size_width", "size_length", "size").apply(&mut out).unwrap();
        assert_eq!(out.get("size").unwrap(), r#"{"width": 200, "length": 500}"#);
        assert!(!out.contains_key("size_width"));
        assert!(!out.contains_key("size_length"));
    }

    #[test]
    fn test_pack_size_rejects_non_integer() {
        let mut out = record(json!({"size_width": "wide", "size_length": 500}));
        let err = PostStep::pack_size("size_width", "size_length", "size")
            .apply(&mut out)
            .unwrap_err();
        assert!(matches!(err, FlattenError::IntCoercion { ref key, .. } if key == "size_width"));
    }

    #[test]
    fn test_unpack_flag_array() {
        let mut out = record(json!({"wheelBrakes": [false, true, 0, 1, "true"]}));
        PostStep::unpack_flags(
            "wheelBrakes",
            &["unavailable", "leftFront", "leftRear", "rightFront", "rightRear"],
        )
        .apply(&mut out)
        .unwrap();

        assert_eq!(out.get("wheelBrakes_unavailable").unwrap(), false);
        assert_eq!(out.get("wheelBrakes_leftFront").unwrap(), true);
        assert_eq!(out.get("wheelBrakes_leftRear").unwrap(), false);
        assert_eq!(out.get("wheelBrakes_rightFront").unwrap(), true);
        assert_eq!(out.get("wheelBrakes_rightRear").unwrap(), true);
        assert!(!out.contains_key("wheelBrakes"));
    }

    #[test]
    fn test_unpack_bit_string_short() {
        let mut out = record(json!({"flags": "01"}));
        PostStep::unpack_flags("flags", &["a", "b", "c"]).apply(&mut out).unwrap();
        assert_eq!(out.get("flags_a").unwrap(), false);
        assert_eq!(out.get("flags_b").unwrap(), true);
        assert!(!out.contains_key("flags_c"));
    }

    #[test]
    fn test_removed_sources_keep_key_order() {
        let mut out = record(json!({"a": 1, "flags": "01", "w": 3, "l": 4, "z": 2}));
        PostStep::unpack_flags("flags", &["x", "y"]).apply(&mut out).unwrap();
        PostStep::pack_size("w", "l", "size").apply(&mut out).unwrap();

        let keys: Vec<_> = out.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "z", "flags_x", "flags_y", "size"]);
    }

    #[test]
    fn test_normalize_timestamp_truncates() {
        assert_eq!(
            normalize_timestamp("2019-09-16T14:02:11.123456Z[UTC]").unwrap(),
            "2019-09-16T14:02:11.123"
        );
        assert_eq!(
            normalize_timestamp("2019-09-16T14:02:11.5Z").unwrap(),
            "2019-09-16T14:02:11.500"
        );
        assert_eq!(
            normalize_timestamp("2019-09-16 14:02:11").unwrap(),
            "2019-09-16T14:02:11.000"
        );
        assert!(normalize_timestamp("yesterday").is_none());
        assert!(normalize_timestamp("2019-13-40T00:00:00").is_none());
    }

    #[test]
    fn test_timestamp_step_errors_on_garbage() {
        let mut out = record(json!({"metadata_received_At": "soon"}));
        let err = PostStep::normalize_timestamp("metadata_received_At")
            .apply(&mut out)
            .unwrap_err();
        assert!(matches!(err, FlattenError::Timestamp { .. }));
    }
}
