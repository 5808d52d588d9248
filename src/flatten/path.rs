//! Key-path navigation over raw records.
//!
//! Paths are lists of object keys. Any non-object along the way ends the walk.

use serde_json::Value;

pub fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.as_object()?.get(key))
}

pub fn lookup_mut<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    path.iter()
        .try_fold(root, |node, key| node.as_object_mut()?.get_mut(key))
}

/// Remove and return the value at `path`. Sibling keys keep their order.
pub fn take(root: &mut Value, path: &[String]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    lookup_mut(root, parents)?.as_object_mut()?.shift_remove(last)
}

/// Nest `value` under `path`, innermost key last
pub fn wrap(path: &[String], value: Value) -> Value {
    path.iter().rev().fold(value, |inner, key| {
        let mut map = serde_json::Map::new();
        map.insert(key.clone(), inner);
        Value::Object(map)
    })
}

pub fn owned(path: &[&str]) -> Vec<String> {
    path.iter().map(|s| s.to_string()).collect()
}
