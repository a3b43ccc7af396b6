//! Main enforcement entry: every path and method not claimed by the
//! verification routes lands here.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use audit_log::AuditEventType;
use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, info_span, warn, Instrument};
use trust_context::{builder, ContextError, RequestFacts, RequestIntent, TrustContext};

use crate::audit::RequestAudit;
use crate::error::PepError;
use crate::state::GatewayState;
use crate::verification::{redirect_to, LOGIN_ENTRY};

/// Methods the gateway enforces and forwards.
fn is_enforced(method: &Method) -> bool {
    [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
    ]
    .contains(method)
}

/// Caller's network address, when the server was started with connect
/// info.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for PeerAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(peer_ip(parts)))
    }
}

fn peer_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Where the trust context of a request came from.
enum Inbound {
    /// JSON body; `payload` is the body minus the trust data.
    Structured {
        context: TrustContext,
        payload: Map<String, Value>,
    },
    /// Browser request resolved through the session cookie. Forwarded with
    /// an empty JSON object as payload.
    Session { context: TrustContext },
    /// Neither a trust payload nor a live session.
    Anonymous,
}

pub async fn enforce(State(state): State<GatewayState>, request: Request) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!(
        "pep",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    async move {
        match handle(&state, request, &request_id).await {
            Ok(response) => response,
            Err(err) => {
                warn!(status = err.status().as_u16(), error = %err, "request rejected");
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn handle(
    state: &GatewayState,
    request: Request,
    request_id: &str,
) -> Result<Response, PepError> {
    let (parts, body) = request.into_parts();
    if !is_enforced(&parts.method) {
        return Err(PepError::MethodNotAllowed(parts.method));
    }

    let facts = RequestFacts::new(peer_ip(&parts), parts.uri.path(), parts.method.as_str());
    let audit = RequestAudit::new(&state.audit, request_id, &facts);

    let inbound = if is_json(&parts.headers) {
        let bytes = axum::body::to_bytes(body, state.max_body_bytes)
            .await
            .map_err(PepError::BodyUnreadable)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(PepError::MalformedJson)?;
        match builder::from_body(value, &facts) {
            Ok(extracted) => Inbound::Structured {
                context: extracted.context,
                payload: extracted.payload,
            },
            Err(err) => {
                if err == ContextError::MissingTrustData {
                    audit.event(AuditEventType::TrustDataMissing, Value::Null).await;
                }
                return Err(err.into());
            }
        }
    } else {
        match state.sessions.resolve(&parts.headers, Utc::now()) {
            Some(record) => Inbound::Session {
                context: builder::from_session(&record.token, &facts),
            },
            None => Inbound::Anonymous,
        }
    };

    let (mut context, payload) = match inbound {
        Inbound::Structured { context, payload } => (context, payload),
        Inbound::Session { context } => (context, Map::new()),
        Inbound::Anonymous => {
            info!("no trust payload and no session; redirecting to login");
            audit
                .event(AuditEventType::LoginRedirected, json!({ "location": LOGIN_ENTRY }))
                .await;
            return Ok(redirect_to(LOGIN_ENTRY));
        }
    };

    let intent = RequestIntent::classify(&context);
    info!(%intent, answered_locally = intent.is_identity_lifecycle(), "request classified");

    match intent {
        RequestIntent::Generic => {
            let verdict = state.trust_engine.decide(&context).await;
            audit.verdict(intent, &verdict).await;
            verdict.into_grant().map_err(PepError::LowClientTrust)?;

            let path_and_query = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| parts.uri.path());
            let reply = match state
                .forwarder
                .forward(&parts.method, path_and_query, Some(&payload))
                .await
            {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(%err, "backend request failed");
                    audit
                        .event(AuditEventType::BackendFailed, json!({ "error": err.to_string() }))
                        .await;
                    return Err(PepError::Backend(err));
                }
            };
            audit
                .event(
                    AuditEventType::RequestForwarded,
                    json!({ "status": reply.status.as_u16() }),
                )
                .await;
            Ok(reply.into_response())
        }
        RequestIntent::Login => {
            let verdict = state.trust_engine.login(&mut context).await;
            audit.verdict(intent, &verdict).await;
            let grant = verdict.into_grant().map_err(PepError::LowClientTrust)?;

            let issued = state.sessions.issue(grant, Utc::now());
            audit
                .event(
                    AuditEventType::SessionIssued,
                    json!({ "expires_at": issued.record.expires_at }),
                )
                .await;
            Ok((
                AppendHeaders([(SET_COOKIE, issued.cookie)]),
                Json(json!({ "session": issued.record.token })),
            )
                .into_response())
        }
        RequestIntent::Logout => {
            let verdict = state.trust_engine.logout(&context).await;
            audit.verdict(intent, &verdict).await;
            verdict.into_grant().map_err(PepError::LowClientTrust)?;

            let cleared = state.sessions.revoke(&parts.headers);
            if cleared.is_some() {
                audit.event(AuditEventType::SessionRevoked, Value::Null).await;
            }
            Ok((
                AppendHeaders(cleared.map(|cookie| (SET_COOKIE, cookie))),
                Json(json!("Logout successful")),
            )
                .into_response())
        }
        RequestIntent::Register => {
            let verdict = state.trust_engine.register(&context).await;
            audit.verdict(intent, &verdict).await;
            verdict.into_grant().map_err(PepError::LowClientTrust)?;
            Ok(Json(json!("Registration successful")).into_response())
        }
        RequestIntent::RemoveAccount => {
            audit
                .event(AuditEventType::IntentUnsupported, json!({ "intent": intent.as_str() }))
                .await;
            Err(PepError::UnsupportedIntent(intent))
        }
    }
}

/// `application/json` or any `application/*+json` media type.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn json_media_types() {
        assert!(is_json(&with_content_type("application/json")));
        assert!(is_json(&with_content_type("application/json; charset=utf-8")));
        assert!(is_json(&with_content_type("Application/JSON")));
        assert!(is_json(&with_content_type("application/problem+json")));
    }

    #[test]
    fn non_json_media_types() {
        assert!(!is_json(&HeaderMap::new()));
        assert!(!is_json(&with_content_type("text/html")));
        assert!(!is_json(&with_content_type("application/x-www-form-urlencoded")));
        assert!(!is_json(&with_content_type("text/json+plain")));
    }
}
