//! Trust context assembly.
//!
//! A context comes from one of three places: the `_trustData` key of a JSON
//! body, a resolved session, or the browser login form. Whatever the origin,
//! [`enrich`] then stamps the facts the gateway observed itself over
//! anything the caller claimed.

use std::net::IpAddr;

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{keys, TrustContext, TRUST_DATA_KEY};
use crate::error::{json_kind, ContextError};

/// Enforcement-relevant facts observed by the gateway, never taken from the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFacts {
    pub ip: Option<IpAddr>,
    pub resource: String,
    pub action: String,
}

impl RequestFacts {
    pub fn new(ip: Option<IpAddr>, resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            ip,
            resource: resource.into(),
            action: action.into(),
        }
    }
}

/// A JSON body split into the trust context and the application payload
/// that may be forwarded downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub context: TrustContext,
    pub payload: Map<String, Value>,
}

/// Remove the trust payload from `body`, returning it alongside the rest.
pub fn split_trust_data(mut body: Map<String, Value>) -> (Option<Value>, Map<String, Value>) {
    let trust = body.remove(TRUST_DATA_KEY);
    (trust, body)
}

/// Turn a raw trust payload into a context.
pub fn validate(trust: Option<Value>) -> Result<TrustContext, ContextError> {
    match trust {
        None | Some(Value::Null) => Err(ContextError::MissingTrustData),
        Some(Value::Object(map)) => Ok(TrustContext::from(map)),
        Some(other) => Err(ContextError::InvalidTrustData {
            found: json_kind(&other),
        }),
    }
}

/// Overwrite `ip`, `resource` and `action` with what the gateway observed.
pub fn enrich(ctx: &mut TrustContext, facts: &RequestFacts) {
    let ip = facts
        .ip
        .map(|ip| Value::String(ip.to_string()))
        .unwrap_or(Value::Null);
    ctx.insert(keys::IP, ip);
    ctx.insert(keys::RESOURCE, facts.resource.clone());
    ctx.insert(keys::ACTION, facts.action.clone());
}

/// Build a context from a structured request body.
pub fn from_body(body: Value, facts: &RequestFacts) -> Result<Extracted, ContextError> {
    let body = match body {
        Value::Object(map) => map,
        other => {
            return Err(ContextError::BodyNotObject {
                found: json_kind(&other),
            })
        }
    };
    let (trust, payload) = split_trust_data(body);
    let mut context = validate(trust)?;
    enrich(&mut context, facts);
    debug!(context = %context.dump(), "trust context assembled from request body");
    Ok(Extracted { context, payload })
}

/// Build the stand-in context for a caller authenticated by session.
pub fn from_session(token: &str, facts: &RequestFacts) -> TrustContext {
    let mut context = TrustContext::from_session(token);
    enrich(&mut context, facts);
    debug!(context = %context.dump(), "trust context assembled from session");
    context
}

/// Build a login context from browser form credentials. A field the form
/// left out is sent as `null`.
pub fn from_login_form(
    username: Option<&str>,
    password: Option<&str>,
    facts: &RequestFacts,
) -> TrustContext {
    let mut context = TrustContext::new();
    context.insert(keys::USER, username);
    context.insert(keys::PASSWORD, password);
    context.insert(keys::REQUEST_TYPE, "login");
    enrich(&mut context, facts);
    context
}
