use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-facing reason for an explicit Trust Engine denial.
pub const DENIED_BY_ENGINE: &str = "Trust Engine Denied Access";

/// Caller-facing reason for a login refused by the reputation pre-check.
pub const LOW_IP_REPUTATION: &str = "Low IP Reputation";

/// Opaque `trustLevel` value returned by the Trust Engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustLevel(Value);

impl TrustLevel {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// A level grants access when it is truthy: not `null`, `false`, zero,
    /// an empty string, or an empty collection.
    pub fn is_granted(&self) -> bool {
        match &self.0 {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Successful login: the Trust Engine's session token and the level it
/// granted.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub session: String,
    pub trust_level: TrustLevel,
}

/// Outcome of one decision request.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    Granted(T),
    /// Explicit refusal. `reason` is safe to show to the caller.
    Denied { reason: String },
    /// The Trust Engine could not be consulted. `reason` is diagnostic only.
    Unavailable { reason: String },
}

impl<T> Verdict<T> {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// `granted`, `denied` or `unavailable`.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Granted(_) => "granted",
            Self::Denied { .. } => "denied",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Granted(_) => None,
            Self::Denied { reason } | Self::Unavailable { reason } => Some(reason),
        }
    }

    /// Converts into a `Result`, folding both refusal kinds into the
    /// caller-facing denial message.
    pub fn into_grant(self) -> Result<T, String> {
        match self {
            Self::Granted(value) => Ok(value),
            Self::Denied { reason } => Err(reason),
            Self::Unavailable { .. } => Err(DENIED_BY_ENGINE.to_string()),
        }
    }
}
