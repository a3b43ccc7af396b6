use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No `_trustData`, or it was `null`.
    #[error("Trust data is missing")]
    MissingTrustData,

    #[error("Trust data must be a JSON object, got {found}")]
    InvalidTrustData { found: &'static str },

    #[error("Request body must be a JSON object, got {found}")]
    BodyNotObject { found: &'static str },
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
