//! Optional extension ("part II") payloads.
//!
//! An extension container is detached from the raw record before the core
//! record is flattened. Each payload inside it is flattened with the
//! extension's own rules and merged into the top level of the output.

use crate::error::Result;
use crate::flatten::engine::transform;
use crate::flatten::path::{lookup, take};
use crate::flatten::types::{FieldRules, FlatRecord};
use serde_json::Value;

/// How the payload sits inside each container entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLayout {
    /// The entry value is the payload
    Direct,
    /// The entry value maps variant names to payloads; every variant present is flattened
    Variants,
}

/// Where an extension container lives and how to flatten it
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionRule {
    /// Path to the container from the record root
    pub container: Vec<String>,

    /// Key inside each entry holding the payload (None: the entry itself)
    pub entry_key: Option<String>,

    pub layout: PayloadLayout,

    /// Renames and coercions applied to every payload
    pub rules: FieldRules,
}

impl ExtensionRule {
    pub fn new(container: &[&str], layout: PayloadLayout, rules: FieldRules) -> Self {
        ExtensionRule {
            container: container.iter().map(|s| s.to_string()).collect(),
            entry_key: None,
            layout,
            rules,
        }
    }

    pub fn with_entry_key(mut self, key: &str) -> Self {
        self.entry_key = Some(key.to_string());
        self
    }

    /// Remove the container from `record`, returning it if it was present
    pub fn detach(&self, record: &mut Value) -> Option<Value> {
        take(record, &self.container)
    }

    /// Flatten every payload of a detached container into one flat mapping.
    ///
    /// The container may be a list of entries or a single entry. Entries or
    /// payloads that are not mappings are ignored.
    pub fn flatten_container(&self, container: &Value, separator: &str) -> Result<FlatRecord> {
        let mut out = FlatRecord::new();

        let entries: Vec<&Value> = match container {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        for entry in entries {
            let payload = match &self.entry_key {
                Some(key) => lookup(entry, std::slice::from_ref(key)),
                None => Some(entry),
            };
            let Some(payload) = payload else {
                continue;
            };
            let Value::Object(variants) = payload else {
                continue;
            };

            match self.layout {
                PayloadLayout::Direct => {
                    out.extend(transform(payload, &self.rules, separator)?);
                }
                PayloadLayout::Variants => {
                    for variant in variants.values().filter(|v| v.is_object()) {
                        out.extend(transform(variant, &self.rules, separator)?);
                    }
                }
            }
        }

        Ok(out)
    }
}
