use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use trust_context::TrustContext;

use crate::reputation::ReputationOracle;
use crate::verdict::{LoginGrant, TrustLevel, Verdict, DENIED_BY_ENGINE, LOW_IP_REPUTATION};

/// Logins from addresses scoring above this are refused outright.
pub const DEFAULT_REPUTATION_THRESHOLD: u32 = 50;

/// Trust Engine endpoints, relative to its base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Decision,
    Login,
    Logout,
    Register,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Decision => "/getDecision",
            Self::Login => "/login",
            Self::Logout => "/logout",
            Self::Register => "/register",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EngineReply {
    #[serde(rename = "trustLevel", default)]
    trust_level: Option<Value>,
    #[serde(default)]
    session: Option<Value>,
}

/// Client for the Policy Decision Point.
///
/// Built once at startup and shared by every request handler.
pub struct TrustEngineClient {
    base_url: String,
    http: reqwest::Client,
    reputation: Arc<dyn ReputationOracle>,
    reputation_threshold: u32,
}

impl TrustEngineClient {
    pub fn new(
        base_url: impl Into<String>,
        http: reqwest::Client,
        reputation: Arc<dyn ReputationOracle>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            reputation,
            reputation_threshold: DEFAULT_REPUTATION_THRESHOLD,
        }
    }

    pub fn with_reputation_threshold(mut self, threshold: u32) -> Self {
        self.reputation_threshold = threshold;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Go/no-go for a generic request.
    pub async fn decide(&self, ctx: &TrustContext) -> Verdict<TrustLevel> {
        self.level_decision(Endpoint::Decision, ctx).await
    }

    pub async fn logout(&self, ctx: &TrustContext) -> Verdict<TrustLevel> {
        self.level_decision(Endpoint::Logout, ctx).await
    }

    pub async fn register(&self, ctx: &TrustContext) -> Verdict<TrustLevel> {
        self.level_decision(Endpoint::Register, ctx).await
    }

    /// Negotiate a login.
    ///
    /// The caller's address is scored first. A failed lookup counts as a
    /// score of zero; a score above the threshold refuses the login without
    /// contacting the Trust Engine. Otherwise the reputation attributes are
    /// merged into `ctx` before it is submitted.
    #[instrument(skip_all, fields(ip = ctx.ip().unwrap_or("<unknown>")))]
    pub async fn login(&self, ctx: &mut TrustContext) -> Verdict<LoginGrant> {
        let lookup = match ctx.ip() {
            Some(ip) => Some(self.reputation.check(ip).await),
            None => None,
        };
        let score = match lookup {
            Some(Ok(report)) => {
                let score = report.abuse_confidence_score;
                if score <= self.reputation_threshold {
                    report.apply_to(ctx);
                }
                score
            }
            Some(Err(err)) => {
                warn!(%err, "IP reputation lookup failed; treating score as 0");
                0
            }
            None => {
                warn!("caller address unknown; skipping IP reputation lookup");
                0
            }
        };

        if score > self.reputation_threshold {
            info!(score, threshold = self.reputation_threshold, "login refused on IP reputation");
            return Verdict::denied(LOW_IP_REPUTATION);
        }
        debug!(context = %ctx.dump(), "submitting login");

        let reply = match self.submit(Endpoint::Login, ctx).await {
            Ok(reply) => reply,
            Err(verdict) => return verdict,
        };

        let level = TrustLevel::new(reply.trust_level.unwrap_or(Value::Null));
        if !level.is_granted() {
            info!("Trust Engine refused login");
            return Verdict::denied(DENIED_BY_ENGINE);
        }
        match reply.session {
            Some(Value::String(token)) if !token.is_empty() => Verdict::Granted(LoginGrant {
                session: token,
                trust_level: level,
            }),
            Some(Value::Number(n)) => Verdict::Granted(LoginGrant {
                session: n.to_string(),
                trust_level: level,
            }),
            _ => {
                warn!("Trust Engine granted login without a session token");
                Verdict::unavailable("login reply carried no session token")
            }
        }
    }

    async fn level_decision(&self, endpoint: Endpoint, ctx: &TrustContext) -> Verdict<TrustLevel> {
        let reply = match self.submit(endpoint, ctx).await {
            Ok(reply) => reply,
            Err(verdict) => return verdict,
        };
        let level = TrustLevel::new(reply.trust_level.unwrap_or(Value::Null));
        if level.is_granted() {
            Verdict::Granted(level)
        } else {
            info!(endpoint = endpoint.path(), "Trust Engine returned no trust");
            Verdict::denied(DENIED_BY_ENGINE)
        }
    }

    /// POST `ctx` to `endpoint`. A non-success status is an explicit denial;
    /// a transport or decoding failure makes the engine unavailable. Either
    /// way the refusal comes back ready to return.
    #[instrument(skip_all, fields(endpoint = endpoint.path()))]
    async fn submit<T>(&self, endpoint: Endpoint, ctx: &TrustContext) -> Result<EngineReply, Verdict<T>> {
        let url = format!("{}{}", self.base_url, endpoint.path());

        let response = match self.http.post(&url).json(ctx).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, %err, "Trust Engine unreachable; enforcing as denial");
                return Err(Verdict::unavailable(format!("Trust Engine unreachable: {err}")));
            }
        };

        let status = response.status();
        if !status.is_success() {
            info!(status = status.as_u16(), "Trust Engine failed the request");
            return Err(Verdict::denied(DENIED_BY_ENGINE));
        }

        match response.json::<EngineReply>().await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                warn!(%url, %err, "Trust Engine reply could not be decoded; enforcing as denial");
                Err(Verdict::unavailable(format!("malformed Trust Engine reply: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reputation::{ReputationError, ReputationReport};
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedScore(Option<u32>);

    #[async_trait]
    impl ReputationOracle for FixedScore {
        async fn check(&self, _ip: &str) -> Result<ReputationReport, ReputationError> {
            match self.0 {
                Some(score) => Ok(ReputationReport {
                    country_code: Some("NL".to_string()),
                    abuse_confidence_score: score,
                    domain: Some("example.net".to_string()),
                    total_reports: 2,
                }),
                None => Err(ReputationError::NoData),
            }
        }
    }

    fn client(server: &MockServer, score: Option<u32>) -> TrustEngineClient {
        TrustEngineClient::new(server.uri(), reqwest::Client::new(), Arc::new(FixedScore(score)))
    }

    fn ctx(value: Value) -> TrustContext {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn generic_grant_returns_trust_level() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getDecision"))
            .and(body_partial_json(json!({"user": "alice"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trustLevel": 3})))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = client(&server, None).decide(&ctx(json!({"user": "alice"}))).await;
        assert_eq!(verdict, Verdict::Granted(TrustLevel::new(3)));
    }

    #[tokio::test]
    async fn non_success_status_is_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getDecision"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"trustLevel": 5})))
            .mount(&server)
            .await;

        let verdict = client(&server, None).decide(&ctx(json!({}))).await;
        assert_eq!(verdict, Verdict::denied(DENIED_BY_ENGINE));
    }

    #[tokio::test]
    async fn missing_or_falsy_level_is_denial() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getDecision"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trustLevel": false})))
            .mount(&server)
            .await;

        let c = client(&server, None);
        assert_eq!(c.decide(&ctx(json!({}))).await.outcome(), "denied");
        assert_eq!(c.register(&ctx(json!({}))).await.outcome(), "denied");
    }

    #[tokio::test]
    async fn unreachable_engine_is_unavailable() {
        let c = TrustEngineClient::new(
            "http://127.0.0.1:1",
            reqwest::Client::new(),
            Arc::new(FixedScore(None)),
        );
        let verdict = c.logout(&ctx(json!({}))).await;
        assert_eq!(verdict.outcome(), "unavailable");
        assert_eq!(verdict.into_grant().unwrap_err(), DENIED_BY_ENGINE);
    }

    #[tokio::test]
    async fn malformed_reply_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let verdict = client(&server, None).logout(&ctx(json!({}))).await;
        assert_eq!(verdict.outcome(), "unavailable");
    }

    #[tokio::test]
    async fn bad_reputation_refuses_login_without_contacting_engine() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": "tok", "trustLevel": 1
            })))
            .expect(0)
            .mount(&server)
            .await;

        let mut login = ctx(json!({"user": "bob", "ip": "203.0.113.5"}));
        let verdict = client(&server, Some(80)).login(&mut login).await;
        assert_eq!(verdict, Verdict::denied(LOW_IP_REPUTATION));
        assert!(!login.contains_key("abuseConfidenceScore"));
    }

    #[tokio::test]
    async fn threshold_score_itself_is_allowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": "tok", "trustLevel": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut login = ctx(json!({"ip": "203.0.113.5"}));
        assert!(client(&server, Some(50)).login(&mut login).await.is_granted());
    }

    #[tokio::test]
    async fn clean_login_is_enriched_and_granted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_partial_json(json!({
                "user": "carol",
                "countryCode": "NL",
                "abuseConfidenceScore": 10,
                "domain": "example.net",
                "totalReports": 2,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": "tok-42", "trustLevel": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut login = ctx(json!({"user": "carol", "ip": "198.51.100.1"}));
        let verdict = client(&server, Some(10)).login(&mut login).await;
        assert_eq!(
            verdict,
            Verdict::Granted(LoginGrant {
                session: "tok-42".to_string(),
                trust_level: TrustLevel::new(2),
            })
        );
    }

    #[tokio::test]
    async fn failed_lookup_counts_as_clean() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": "tok", "trustLevel": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut login = ctx(json!({"ip": "198.51.100.1"}));
        let verdict = client(&server, None).login(&mut login).await;
        assert!(verdict.is_granted());
        assert!(!login.contains_key("countryCode"));
    }

    #[tokio::test]
    async fn login_without_session_token_is_not_granted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trustLevel": 1})))
            .mount(&server)
            .await;

        let mut login = ctx(json!({"ip": "198.51.100.1"}));
        let verdict = client(&server, Some(0)).login(&mut login).await;
        assert_eq!(verdict.outcome(), "unavailable");
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::Decision.path(), "/getDecision");
        assert_eq!(Endpoint::Login.path(), "/login");
        assert_eq!(Endpoint::Logout.path(), "/logout");
        assert_eq!(Endpoint::Register.path(), "/register");
    }
}
