//! Error types for the flattening engine.

use thiserror::Error;

/// Errors raised while turning one raw record into flat output.
///
/// The engine never logs or swallows these; orchestration decides whether a
/// failed record is skipped, retried or fatal.
#[derive(Error, Debug)]
pub enum FlattenError {
    /// A field declared as integer-typed held a value that does not parse as one
    #[error("cannot coerce '{key}' to an integer: {value}")]
    IntCoercion { key: String, value: String },

    /// A scaled float or coordinate component was not numeric
    #[error("cannot coerce '{key}' to a number: {value}")]
    FloatCoercion { key: String, value: String },

    /// A timestamp field could not be parsed
    #[error("unparseable timestamp in '{key}': {value}")]
    Timestamp { key: String, value: String },

    /// JSON-string serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised when parsing provider or message-type names.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("unknown data provider: {0} (expected wydot or thea)")]
    UnknownProvider(String),

    #[error("unknown message type: {0} (expected bsm, tim or spat)")]
    UnknownMessageType(String),
}

pub type Result<T> = std::result::Result<T, FlattenError>;
