//! Fixtures for router-level tests: a gateway wired to mock Trust Engine
//! and backend servers.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use audit_log::AuditSink;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{Method, Request};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;
use trust_engine_client::{ReputationError, ReputationOracle, ReputationReport, TrustEngineClient};
use wiremock::MockServer;

use crate::forwarder::BackendForwarder;
use crate::server::router;
use crate::session::{InMemorySessionStore, SessionManager};
use crate::state::GatewayState;

pub(crate) const PEER: &str = "198.51.100.7:40123";

/// Reputation oracle answering every lookup with the same score, or with
/// no data.
pub(crate) struct FixedScore(pub(crate) Option<u32>);

#[async_trait]
impl ReputationOracle for FixedScore {
    async fn check(&self, _ip: &str) -> Result<ReputationReport, ReputationError> {
        match self.0 {
            Some(score) => Ok(ReputationReport {
                country_code: Some("SE".to_string()),
                abuse_confidence_score: score,
                domain: None,
                total_reports: 0,
            }),
            None => Err(ReputationError::NoData),
        }
    }
}

pub(crate) struct Harness {
    pub(crate) engine: MockServer,
    pub(crate) backend: MockServer,
    pub(crate) store: Arc<InMemorySessionStore>,
    pub(crate) state: GatewayState,
}

impl Harness {
    pub(crate) async fn start() -> Self {
        Self::with_score(None).await
    }

    pub(crate) async fn with_score(score: Option<u32>) -> Self {
        let engine = MockServer::start().await;
        let backend = MockServer::start().await;
        Self::wired(engine, backend, score)
    }

    /// Same as [`Harness::start`] but with an engine URL nothing listens on.
    pub(crate) async fn engine_down() -> Self {
        let mut harness = Self::start().await;
        let http = reqwest::Client::new();
        harness.state.trust_engine = Arc::new(TrustEngineClient::new(
            "http://127.0.0.1:1",
            http,
            Arc::new(FixedScore(None)),
        ));
        harness
    }

    fn wired(engine: MockServer, backend: MockServer, score: Option<u32>) -> Self {
        let http = reqwest::Client::new();
        let store = Arc::new(InMemorySessionStore::new());
        let sessions = SessionManager::new(store.clone(), chrono::Duration::minutes(30));
        let state = GatewayState::new(
            TrustEngineClient::new(engine.uri(), http.clone(), Arc::new(FixedScore(score))),
            BackendForwarder::new(backend.uri(), http),
            sessions,
            AuditSink::disabled(),
        );
        Self {
            engine,
            backend,
            store,
            state,
        }
    }

    pub(crate) async fn send(&self, request: Request<Body>) -> Response {
        router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub(crate) fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    let peer: SocketAddr = PEER.parse().expect("valid peer address");
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(peer))
}

pub(crate) fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    request(method, uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

pub(crate) async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// `sessionKey=<key>` pair from the response's `Set-Cookie`, ready to be
/// sent back in a `Cookie` header.
pub(crate) fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}
