//! Browser login flow: a static form posting credentials, a success hop
//! that checks the issued session, and redirects in between.

use audit_log::AuditEventType;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use trust_context::{builder, RequestFacts, RequestIntent};

use crate::audit::RequestAudit;
use crate::entry::PeerAddr;
use crate::error::PepError;
use crate::state::GatewayState;

pub const LOGIN_ENTRY: &str = "/login";
pub const LOGIN_PAGE: &str = "/verification/loginPage";
pub const LOGIN_SUBMIT: &str = "/verification/loginSubmit";
pub const LOGIN_SUCCESS: &str = "/verification/success";

const LOGIN_FORM_HTML: &str = include_str!("../assets/login.html");

/// Submitted credentials. Missing fields still go to the Trust Engine, as
/// `null`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub(crate) fn redirect_to(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

pub async fn login_entry() -> Response {
    redirect_to(LOGIN_PAGE)
}

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_FORM_HTML)
}

pub async fn login_submit(
    State(state): State<GatewayState>,
    PeerAddr(ip): PeerAddr,
    method: Method,
    uri: Uri,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(%rejection, "unreadable login form");
            return redirect_to(LOGIN_PAGE);
        }
    };
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!(
        "login_form",
        %request_id,
        user = form.username.as_deref().unwrap_or("<missing>"),
    );
    async move {
        let facts = RequestFacts::new(ip, uri.path(), method.as_str());
        let audit = RequestAudit::new(&state.audit, &request_id, &facts);
        let mut context = builder::from_login_form(
            form.username.as_deref(),
            form.password.as_deref(),
            &facts,
        );

        let verdict = state.trust_engine.login(&mut context).await;
        audit.verdict(RequestIntent::Login, &verdict).await;
        let grant = match verdict.into_grant() {
            Ok(grant) => grant,
            Err(reason) => {
                warn!(%reason, "form login refused");
                return redirect_to(LOGIN_PAGE);
            }
        };

        let issued = state.sessions.issue(grant, Utc::now());
        audit
            .event(
                AuditEventType::SessionIssued,
                json!({ "expires_at": issued.record.expires_at }),
            )
            .await;
        info!("form login accepted");
        (
            StatusCode::FOUND,
            [(LOCATION, LOGIN_SUCCESS.to_string()), (SET_COOKIE, issued.cookie)],
        )
            .into_response()
    }
    .instrument(span)
    .await
}

pub async fn login_success(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, PepError> {
    match state.sessions.resolve(&headers, Utc::now()) {
        Some(_) => Ok(redirect_to("/")),
        None => Err(PepError::MissingSession),
    }
}
