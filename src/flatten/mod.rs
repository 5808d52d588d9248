//! Rule-driven flattening of nested telemetry records
//!
//! A raw record goes through an optional [`SplitRule`] fan-out, then each
//! resulting record is flattened, renamed and coerced by the generic engine
//! using the declarative tables of a [`RuleSet`]. Provider differences live
//! entirely in those tables.

pub mod types;
pub mod engine;
pub mod extension;
pub mod flattener;
pub mod json_text;
pub mod path;
pub mod splitter;
pub mod steps;

pub use types::{
    CoercionPolicy, FieldRules, FlatRecord, IntField, RenameRule, RenameRules, RuleSet,
    ScaledFloatField, DEFAULT_SEPARATOR,
};
pub use engine::{flatten, transform};
pub use extension::{ExtensionRule, PayloadLayout};
pub use flattener::CvFlattener;
pub use splitter::{FieldMatch, SplitOutcome, SplitRule};
pub use steps::{PostStep, MICRODEGREE_SCALE};
