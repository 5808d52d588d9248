//! The generic flatten + rename + coerce transformer.
//!
//! Everything here is a pure function of (record, rules). Nothing is logged and
//! nothing is retained between calls.

use crate::error::{FlattenError, Result};
use crate::flatten::json_text::to_spaced_string;
use crate::flatten::types::{CoercionPolicy, FieldRules, FlatRecord};
use serde_json::{Map, Number, Value};

/// Flatten a nested record into `path -> leaf` pairs, before any renaming.
///
/// Mappings are walked depth first and their keys joined with `separator`.
/// A non-empty list whose elements are all mappings is walked element by
/// element under the same path, so later elements overwrite earlier ones at
/// shared keys. Scalars, lists of scalars and mixed lists are leaves. String
/// leaves are never parsed, even when they contain JSON text.
pub fn flatten(record: &Value, separator: &str) -> FlatRecord {
    flatten_with(record, separator, |_| false)
}

/// Like [`flatten`], but any nested value whose path satisfies `opaque` is
/// kept whole as a leaf instead of being walked.
pub fn flatten_with<F>(record: &Value, separator: &str, opaque: F) -> FlatRecord
where
    F: Fn(&str) -> bool,
{
    let mut out = Map::new();
    if let Value::Object(map) = record {
        walk(map, "", separator, &opaque, &mut out);
    }
    out
}

fn walk<F>(map: &Map<String, Value>, parent: &str, separator: &str, opaque: &F, out: &mut FlatRecord)
where
    F: Fn(&str) -> bool,
{
    for (key, value) in map {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, separator, key)
        };

        if !is_nested(value) || opaque(&path) {
            out.insert(path, value.clone());
            continue;
        }

        match value {
            Value::Object(child) => walk(child, &path, separator, opaque, out),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(child) = item {
                        walk(child, &path, separator, opaque, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Mappings and non-empty lists of mappings are walked; everything else is a leaf
fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}

/// Flatten, rename and coerce one record with the given rules.
///
/// Paths whose renamed form is a JSON-string field are captured whole during
/// the walk, so list-of-struct values keep their element order instead of
/// collapsing by key.
pub fn transform(record: &Value, rules: &FieldRules, separator: &str) -> Result<FlatRecord> {
    let flat = flatten_with(record, separator, |path| {
        !rules.json_string_fields.is_empty() && rules.is_json_string(&rules.renames.rename(path))
    });

    let mut out = FlatRecord::with_capacity(flat.len());
    for (key, value) in flat {
        let name = if rules.renames.is_empty() {
            key
        } else {
            rules.renames.rename(&key)
        };
        out.insert(name, value);
    }

    coerce_ints(&mut out, rules)?;
    coerce_floats(&mut out, rules)?;
    encode_json_strings(&mut out, rules)?;

    Ok(out)
}

fn coerce_ints(out: &mut FlatRecord, rules: &FieldRules) -> Result<()> {
    for field in &rules.int_fields {
        let Some(value) = out.get_mut(&field.key) else {
            continue;
        };
        if is_blank(value) {
            continue;
        }

        match parse_int(value) {
            Some(n) => *value = Value::from(n),
            None => match field.on_error {
                CoercionPolicy::Fail => {
                    return Err(FlattenError::IntCoercion {
                        key: field.key.clone(),
                        value: value.to_string(),
                    })
                }
                CoercionPolicy::Keep => {}
                CoercionPolicy::Null => *value = Value::Null,
            },
        }
    }
    Ok(())
}

fn coerce_floats(out: &mut FlatRecord, rules: &FieldRules) -> Result<()> {
    for field in &rules.float_fields {
        let Some(value) = out.get_mut(&field.key) else {
            continue;
        };
        if is_blank(value) {
            continue;
        }

        let scaled = parse_float(value)
            .map(|f| f / field.scale)
            .and_then(Number::from_f64)
            .ok_or_else(|| FlattenError::FloatCoercion {
                key: field.key.clone(),
                value: value.to_string(),
            })?;
        *value = Value::Number(scaled);
    }
    Ok(())
}

fn encode_json_strings(out: &mut FlatRecord, rules: &FieldRules) -> Result<()> {
    for key in &rules.json_string_fields {
        if let Some(value) = out.get_mut(key) {
            if value.is_null() {
                continue;
            }
            *value = Value::String(to_spaced_string(value)?);
        }
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Integer reading of a leaf: integral numbers, truncated floats, integer
/// strings and booleans
pub(crate) fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Float reading of a leaf: numbers and numeric strings
pub(crate) fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::types::{IntField, RenameRules, ScaledFloatField};
    use serde_json::json;

    #[test]
    fn test_nested_paths_joined() {
        let flat = flatten(&json!({"metadata": {"rmd": {"lat": 41.1}}, "id": 7}), "_");
        assert_eq!(flat.get("metadata_rmd_lat").unwrap(), 41.1);
        assert_eq!(flat.get("id").unwrap(), 7);
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_list_of_structs_last_wins() {
        let flat = flatten(&json!({"items": [{"x": 1}, {"x": 2}]}), "_");
        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("items_x").unwrap(), 2);
    }

    #[test]
    fn test_scalar_and_mixed_lists_are_leaves() {
        let flat = flatten(
            &json!({"brakes": [true, false], "mixed": [{"a": 1}, 2], "empty": []}),
            "_",
        );
        assert_eq!(flat.get("brakes").unwrap(), &json!([true, false]));
        assert_eq!(flat.get("mixed").unwrap(), &json!([{"a": 1}, 2]));
        assert_eq!(flat.get("empty").unwrap(), &json!([]));
    }

    #[test]
    fn test_embedded_json_string_not_parsed() {
        let flat = flatten(&json!({"blob": "{\"a\": 1}"}), "_");
        assert_eq!(flat.get("blob").unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_non_object_root_is_empty() {
        assert!(flatten(&json!([1, 2, 3]), "_").is_empty());
    }

    #[test]
    fn test_unmatched_keys_pass_through() {
        let record = json!({"metadata": {"schemaVersion": 6, "recordType": "bsmTx"}, "extra": {"k": "v"}});
        let rules = FieldRules::new(RenameRules::new(&[("metadata_", "meta_")], &[]));
        let plain = flatten(&record, "_");
        let out = transform(&record, &rules, "_").unwrap();

        assert_eq!(out.get("extra_k"), plain.get("extra_k"));
        assert_eq!(out.get("meta_schemaVersion").unwrap(), 6);
    }

    #[test]
    fn test_exact_rename_collision_last_wins() {
        let record = json!({"a": 1, "b": 2});
        let rules = FieldRules::new(RenameRules::new(&[], &[("a", "c"), ("b", "c")]));
        let out = transform(&record, &rules, "_").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("c").unwrap(), 2);
    }

    #[test]
    fn test_int_coercion() {
        let record = json!({"speed": "42", "heading": 17.9, "empty": "", "none": null});
        let rules = FieldRules::default().with_int_fields(vec![
            IntField::strict("speed"),
            IntField::strict("heading"),
            IntField::strict("empty"),
            IntField::strict("none"),
            IntField::strict("absent"),
        ]);
        let out = transform(&record, &rules, "_").unwrap();
        assert_eq!(out.get("speed").unwrap(), 42);
        assert_eq!(out.get("heading").unwrap(), 17);
        assert_eq!(out.get("empty").unwrap(), "");
        assert!(out.get("none").unwrap().is_null());
        assert!(!out.contains_key("absent"));
    }

    #[test]
    fn test_int_coercion_failure_is_fatal_by_default() {
        let rules = FieldRules::default().with_int_fields(vec![IntField::strict("speed")]);
        let err = transform(&json!({"speed": "fast"}), &rules, "_").unwrap_err();
        assert!(matches!(err, FlattenError::IntCoercion { ref key, .. } if key == "speed"));
    }

    #[test]
    fn test_int_coercion_policies() {
        let rules = FieldRules::default().with_int_fields(vec![
            IntField::lenient("kept", CoercionPolicy::Keep),
            IntField::lenient("nulled", CoercionPolicy::Null),
        ]);
        let out = transform(&json!({"kept": "n/a", "nulled": "n/a"}), &rules, "_").unwrap();
        assert_eq!(out.get("kept").unwrap(), "n/a");
        assert!(out.get("nulled").unwrap().is_null());
    }

    #[test]
    fn test_scaled_float_coercion() {
        let rules = FieldRules::default()
            .with_float_fields(vec![ScaledFloatField::new("lat", 10_000_000.0)]);
        let out = transform(&json!({"lat": 384000000}), &rules, "_").unwrap();
        assert_eq!(out.get("lat").unwrap(), 38.4);
    }

    #[test]
    fn test_json_string_coercion() {
        let rules = FieldRules::default().with_json_string_fields(&["size"]);
        let out = transform(&json!({"size": {"width": 2, "length": 5}}), &rules, "_").unwrap();

        let text = out.get("size").unwrap().as_str().unwrap();
        assert_eq!(text, r#"{"width": 2, "length": 5}"#);
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, json!({"width": 2, "length": 5}));
    }

    #[test]
    fn test_json_string_keeps_list_order() {
        let record = json!({"desc": {"offset": {"nodes": [{"x": 1}, {"x": 2}]}}});
        let rules = FieldRules::new(RenameRules::new(&[], &[("desc_offset_nodes", "nodes")]))
            .with_json_string_fields(&["nodes"]);
        let out = transform(&record, &rules, "_").unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out.get("nodes").unwrap(), r#"[{"x": 1}, {"x": 2}]"#);
    }

    #[test]
    fn test_json_string_wraps_plain_leaf() {
        let rules = FieldRules::default().with_json_string_fields(&["itis", "none"]);
        let out = transform(&json!({"itis": "{\"a\": 1}", "none": null}), &rules, "_").unwrap();
        assert_eq!(out.get("itis").unwrap(), r#""{\"a\": 1}""#);
        assert!(out.get("none").unwrap().is_null());
    }
}
