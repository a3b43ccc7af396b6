use std::sync::Arc;

use audit_log::AuditSink;
use trust_engine_client::TrustEngineClient;

use crate::forwarder::BackendForwarder;
use crate::session::SessionManager;

/// Largest request body the gateway buffers for trust extraction.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Collaborators shared by every request handler, built once at startup.
#[derive(Clone)]
pub struct GatewayState {
    pub trust_engine: Arc<TrustEngineClient>,
    pub forwarder: Arc<BackendForwarder>,
    pub sessions: Arc<SessionManager>,
    pub audit: AuditSink,
    pub max_body_bytes: usize,
}

impl GatewayState {
    pub fn new(
        trust_engine: TrustEngineClient,
        forwarder: BackendForwarder,
        sessions: SessionManager,
        audit: AuditSink,
    ) -> Self {
        Self {
            trust_engine: Arc::new(trust_engine),
            forwarder: Arc::new(forwarder),
            sessions: Arc::new(sessions),
            audit,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}
