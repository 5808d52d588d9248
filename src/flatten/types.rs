use serde_json::{Map, Value};

use crate::flatten::extension::ExtensionRule;
use crate::flatten::splitter::SplitRule;
use crate::flatten::steps::PostStep;

/// A flattened record: joined key path -> scalar or JSON-string value.
///
/// Iteration order is insertion order (serde_json `preserve_order`).
pub type FlatRecord = Map<String, Value>;

/// Separator used to join key path segments
pub const DEFAULT_SEPARATOR: &str = "_";

/// One (source fragment, destination fragment) rename instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

impl RenameRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        RenameRule {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Ordered prefix and exact rename tables.
///
/// Prefix rules run first, then exact rules. Within each kind the rules are
/// applied in list order to the key as rewritten so far, so a later rule sees
/// the output of an earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameRules {
    /// Substring rewrites: the first occurrence of `from` becomes `to`
    pub prefix: Vec<RenameRule>,

    /// Whole-key rewrites: a key equal to `from` becomes `to`
    pub exact: Vec<RenameRule>,
}

impl RenameRules {
    pub fn new(prefix: &[(&str, &str)], exact: &[(&str, &str)]) -> Self {
        RenameRules {
            prefix: to_rules(prefix),
            exact: to_rules(exact),
        }
    }

    /// Compute the final name of a flattened key
    pub fn rename(&self, key: &str) -> String {
        let mut name = key.to_string();

        for rule in &self.prefix {
            if name.contains(rule.from.as_str()) {
                name = name.replacen(rule.from.as_str(), &rule.to, 1);
            }
        }

        for rule in &self.exact {
            if name == rule.from {
                name = rule.to.clone();
            }
        }

        name
    }

    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.exact.is_empty()
    }
}

fn to_rules(pairs: &[(&str, &str)]) -> Vec<RenameRule> {
    pairs
        .iter()
        .map(|(from, to)| RenameRule::new(*from, *to))
        .collect()
}

/// What to do when a declared coercion cannot be applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoercionPolicy {
    /// Fail the whole record
    #[default]
    Fail,
    /// Leave the original value in place
    Keep,
    /// Replace the value with null
    Null,
}

/// A field that receives integer coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntField {
    pub key: String,
    pub on_error: CoercionPolicy,
}

impl IntField {
    pub fn strict(key: impl Into<String>) -> Self {
        IntField {
            key: key.into(),
            on_error: CoercionPolicy::Fail,
        }
    }

    pub fn lenient(key: impl Into<String>, on_error: CoercionPolicy) -> Self {
        IntField {
            key: key.into(),
            on_error,
        }
    }
}

/// A fixed-point field: the stored value is divided by `scale`
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFloatField {
    pub key: String,
    pub scale: f64,
}

impl ScaledFloatField {
    pub fn new(key: impl Into<String>, scale: f64) -> Self {
        ScaledFloatField {
            key: key.into(),
            scale,
        }
    }
}

/// Renames plus coercion classes: everything `transform` needs.
///
/// Coercion keys name fields after renaming.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRules {
    pub renames: RenameRules,
    pub int_fields: Vec<IntField>,
    pub float_fields: Vec<ScaledFloatField>,
    pub json_string_fields: Vec<String>,
}

impl FieldRules {
    pub fn new(renames: RenameRules) -> Self {
        FieldRules {
            renames,
            ..Default::default()
        }
    }

    pub fn with_int_fields(mut self, fields: Vec<IntField>) -> Self {
        self.int_fields = fields;
        self
    }

    pub fn with_float_fields(mut self, fields: Vec<ScaledFloatField>) -> Self {
        self.float_fields = fields;
        self
    }

    pub fn with_json_string_fields(mut self, keys: &[&str]) -> Self {
        self.json_string_fields = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Whether the value at `key` (post-rename) is stored as JSON text
    pub fn is_json_string(&self, key: &str) -> bool {
        self.json_string_fields.iter().any(|k| k == key)
    }
}

/// The full immutable configuration for one provider/message-type stream
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    /// Stream label, e.g. "wydot/BSM"
    pub name: String,

    /// Separator for joined key paths
    pub separator: String,

    /// Renames and coercions for the core record
    pub fields: FieldRules,

    /// Optional extension payload flattened with its own rules
    pub extension: Option<ExtensionRule>,

    /// Optional fan-out of repeated sub-structures before flattening
    pub split: Option<SplitRule>,

    /// Post-processing steps, applied in order after the merge
    pub steps: Vec<PostStep>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, fields: FieldRules) -> Self {
        RuleSet {
            name: name.into(),
            separator: DEFAULT_SEPARATOR.to_string(),
            fields,
            extension: None,
            split: None,
            steps: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: ExtensionRule) -> Self {
        self.extension = Some(extension);
        self
    }

    pub fn with_split(mut self, split: SplitRule) -> Self {
        self.split = Some(split);
        self
    }

    pub fn with_steps(mut self, steps: Vec<PostStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}
