//! Request-boundary errors.
//!
//! Every step of the enforcement pipeline returns `Result<_, PepError>`;
//! the single [`IntoResponse`] impl below is the only place an error kind
//! becomes an HTTP status.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{Method, StatusCode};
use serde_json::json;
use thiserror::Error;
use trust_context::{ContextError, RequestIntent};

#[derive(Debug, Error)]
pub enum PepError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Request body is not valid JSON")]
    MalformedJson(#[source] serde_json::Error),

    #[error("Request body could not be read")]
    BodyUnreadable(#[source] axum::Error),

    /// The Trust Engine or the reputation pre-check refused the request.
    #[error("{0}")]
    LowClientTrust(String),

    #[error("{0} requests are not supported")]
    UnsupportedIntent(RequestIntent),

    #[error("Backend request failed")]
    Backend(#[source] reqwest::Error),

    #[error("Missing Session")]
    MissingSession,

    #[error("Method {0} is not allowed")]
    MethodNotAllowed(Method),
}

impl PepError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Context(ContextError::MissingTrustData) => StatusCode::NOT_IMPLEMENTED,
            Self::Context(_) | Self::MalformedJson(_) | Self::BodyUnreadable(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::LowClientTrust(_) | Self::MissingSession => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnsupportedIntent(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for PepError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
