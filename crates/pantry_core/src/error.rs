//! Error types for pantry_core

use serde_json::Value;
use thiserror::Error;

/// Errors raised by reactive records
#[derive(Error, Debug)]
pub enum CoreError {
    /// A record was built from something other than a JSON object
    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// A field was read that the record does not hold
    #[error("record has no field `{key}`")]
    MissingField { key: String },

    /// A field value did not deserialize into the requested type
    #[error("field `{key}` could not be decoded: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized into JSON
    #[error("value for `{key}` could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for pantry_core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Name of a JSON value's kind, for error messages
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
