use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved request-body key holding the caller's trust payload.
pub const TRUST_DATA_KEY: &str = "_trustData";

/// Well-known trust context keys.
pub mod keys {
    pub const IP: &str = "ip";
    pub const RESOURCE: &str = "resource";
    pub const ACTION: &str = "action";
    pub const REQUEST_TYPE: &str = "requestType";
    pub const SESSION: &str = "session";
    pub const USER: &str = "user";
    pub const PASSWORD: &str = "password";
}

/// Substrings of keys whose values never appear in diagnostic dumps.
const MASKED_KEY_PARTS: &[&str] = &["password", "secret", "token", "session"];

/// Attributes describing a request's subject and environment, sent as-is to
/// the Trust Engine.
///
/// Serializes transparently as the underlying JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustContext(Map<String, Value>);

impl TrustContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimal context standing in for a caller that presented only a
    /// session. The Trust Engine expands it from its own records.
    pub fn from_session(token: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.insert(keys::SESSION, token.into());
        ctx
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Observed caller address, once the context has been enriched.
    pub fn ip(&self) -> Option<&str> {
        self.get_str(keys::IP)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Human-readable, credential-masked rendering for logs.
    pub fn dump(&self) -> ContextDump<'_> {
        ContextDump(self)
    }
}

impl From<Map<String, Value>> for TrustContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<TrustContext> for Value {
    fn from(ctx: TrustContext) -> Self {
        Value::Object(ctx.0)
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for TrustContext {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// `Display` adapter returned by [`TrustContext::dump`].
///
/// One `key: value` line per entry; nested objects are expanded one level
/// with two-space indentation.
pub struct ContextDump<'a>(&'a TrustContext);

impl fmt::Display for ContextDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.0.as_map() {
            match value {
                Value::Object(inner) if !is_masked(key) => {
                    writeln!(f, "{key}:")?;
                    for (inner_key, inner_value) in inner {
                        writeln!(f, "  {inner_key}: {}", render(inner_key, inner_value))?;
                    }
                }
                _ => writeln!(f, "{key}: {}", render(key, value))?,
            }
        }
        Ok(())
    }
}

fn is_masked(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    MASKED_KEY_PARTS.iter().any(|part| lower.contains(part))
}

fn render(key: &str, value: &Value) -> String {
    if is_masked(key) {
        return "[REDACTED]".to_string();
    }
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
