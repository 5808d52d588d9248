use crate::error::Result;
use crate::flatten::engine;
use crate::flatten::splitter::SplitOutcome;
use crate::flatten::types::{FlatRecord, RuleSet};
use crate::providers::{MessageType, Provider};
use serde_json::Value;

/// Flattens raw records of one stream according to its [`RuleSet`].
///
/// The rule set is immutable after construction, so one flattener can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct CvFlattener {
    rules: RuleSet,
}

impl CvFlattener {
    pub fn new(rules: RuleSet) -> Self {
        CvFlattener { rules }
    }

    /// Flattener with the built-in rule set for a provider and message type
    pub fn for_stream(provider: Provider, message_type: MessageType) -> Self {
        Self::new(RuleSet::for_stream(provider, message_type))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Path-joined leaves of `record`, before renaming or coercion
    pub fn flatten(&self, record: &Value) -> FlatRecord {
        engine::flatten(record, &self.rules.separator)
    }

    /// Flatten, rename and coerce `record` with the core field rules only
    pub fn transform(&self, record: &Value) -> Result<FlatRecord> {
        engine::transform(record, &self.rules.fields, &self.rules.separator)
    }

    /// Turn one raw record into one flat record.
    ///
    /// The extension container, if any, is detached and flattened with its
    /// own rules; its fields are merged over the core fields. Post-processing
    /// steps then run in order.
    pub fn process(&self, mut record: Value) -> Result<FlatRecord> {
        let extension = self
            .rules
            .extension
            .as_ref()
            .and_then(|ext| ext.detach(&mut record).map(|container| (ext, container)));

        let mut out = self.transform(&record)?;

        if let Some((ext, container)) = extension {
            out.extend(ext.flatten_container(&container, &self.rules.separator)?);
        }

        for step in &self.rules.steps {
            step.apply(&mut out)?;
        }

        Ok(out)
    }

    /// Expand a raw record into its logical entries. Streams without a split
    /// rule pass every record through.
    pub fn split(&self, record: Value) -> SplitOutcome {
        match &self.rules.split {
            Some(rule) => rule.split(record),
            None => SplitOutcome::Passthrough(record),
        }
    }

    /// Split, then process every resulting record
    pub fn process_and_split(&self, record: Value) -> Result<Vec<FlatRecord>> {
        self.split(record)
            .into_records()
            .into_iter()
            .map(|rec| self.process(rec))
            .collect()
    }
}
