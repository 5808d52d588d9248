//! Fan-out of raw records that bundle several logical entries.
//!
//! A [`SplitRule`] names a repeated container inside the raw record. Each
//! entry of that container becomes its own deep copy of the record with the
//! container replaced by the single entry. Nested rules expand each entry
//! further, so every combination of nesting levels becomes one record.

use crate::flatten::path::{lookup, lookup_mut, owned, wrap};
use serde_json::Value;

/// Result of splitting one raw record
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// The repeated structure was found; one record per entry (possibly none)
    Expanded(Vec<Value>),
    /// The structure was absent or malformed; the record is unchanged
    Passthrough(Value),
}

impl SplitOutcome {
    pub fn into_records(self) -> Vec<Value> {
        match self {
            SplitOutcome::Expanded(records) => records,
            SplitOutcome::Passthrough(record) => vec![record],
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, SplitOutcome::Expanded(_))
    }
}

/// A field value that exempts a record from splitting
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub path: Vec<String>,
    pub value: Value,
}

/// Where the repeated structure is and how entries are written back
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRule {
    /// Path to the container, from the record root (or from the parent entry for nested rules)
    pub container: Vec<String>,

    /// Alternative paths, relative to the container or to each of its list
    /// elements, at which entries are found. Empty: the container holds them.
    pub entry_paths: Vec<Vec<String>>,

    /// Path under the container at which the single entry is written back.
    /// Empty: the entry replaces the container.
    pub rewrap: Vec<String>,

    /// Expansion applied to each entry
    pub nested: Option<Box<SplitRule>>,

    /// Records matching any of these are passed through unsplit
    pub skip_when: Vec<FieldMatch>,
}

impl SplitRule {
    pub fn new(container: &[&str]) -> Self {
        SplitRule {
            container: owned(container),
            entry_paths: Vec::new(),
            rewrap: Vec::new(),
            nested: None,
            skip_when: Vec::new(),
        }
    }

    pub fn with_entry_paths(mut self, paths: &[&[&str]]) -> Self {
        self.entry_paths = paths.iter().map(|p| owned(p)).collect();
        self
    }

    pub fn rewrap_under(mut self, path: &[&str]) -> Self {
        self.rewrap = owned(path);
        self
    }

    pub fn with_nested(mut self, nested: SplitRule) -> Self {
        self.nested = Some(Box::new(nested));
        self
    }

    pub fn skip_when(mut self, path: &[&str], value: Value) -> Self {
        self.skip_when.push(FieldMatch {
            path: owned(path),
            value,
        });
        self
    }

    /// Split one raw record. Never fails: any shape the rule does not
    /// recognize yields [`SplitOutcome::Passthrough`].
    pub fn split(&self, record: Value) -> SplitOutcome {
        if self
            .skip_when
            .iter()
            .any(|m| lookup(&record, &m.path).is_some_and(|v| same_value(v, &m.value)))
        {
            return SplitOutcome::Passthrough(record);
        }

        match self.expand(&record) {
            Some(records) => SplitOutcome::Expanded(records),
            None => SplitOutcome::Passthrough(record),
        }
    }

    /// One copy of `root` per entry, or None when the container is absent or malformed
    fn expand(&self, root: &Value) -> Option<Vec<Value>> {
        let container = lookup(root, &self.container)?;
        let entries = self.entries(container)?;

        let mut out = Vec::new();
        for entry in entries {
            let variants = match &self.nested {
                Some(nested) => nested.expand(entry).unwrap_or_else(|| vec![entry.clone()]),
                None => vec![entry.clone()],
            };

            for variant in variants {
                let mut copy = root.clone();
                *lookup_mut(&mut copy, &self.container)? = wrap(&self.rewrap, variant);
                out.push(copy);
            }
        }

        Some(out)
    }

    fn entries<'a>(&self, container: &'a Value) -> Option<Vec<&'a Value>> {
        let mut found = Vec::new();

        if self.entry_paths.is_empty() {
            collect(container, &mut found)?;
            return Some(found);
        }

        match container {
            Value::Array(items) => {
                for item in items {
                    if let Some(entry) = self.locate(item) {
                        collect(entry, &mut found)?;
                    }
                }
            }
            Value::Object(_) => collect(self.locate(container)?, &mut found)?,
            _ => return None,
        }

        Some(found)
    }

    fn locate<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.entry_paths
            .iter()
            .find_map(|path| lookup(value, path).filter(|v| !v.is_null()))
    }
}

/// Equality where numbers compare by value, so `5.0` matches `5`
fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

/// Accept a mapping or a list of mappings
fn collect<'a>(value: &'a Value, found: &mut Vec<&'a Value>) -> Option<()> {
    match value {
        Value::Object(_) => found.push(value),
        Value::Array(items) => {
            if !items.iter().all(Value::is_object) {
                return None;
            }
            found.extend(items.iter());
        }
        _ => return None,
    }
    Some(())
}
