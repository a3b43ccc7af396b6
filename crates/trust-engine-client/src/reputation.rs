//! IP reputation lookups consulted before a login is negotiated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use trust_context::TrustContext;

/// Public AbuseIPDB check endpoint.
pub const ABUSEIPDB_CHECK_URL: &str = "https://api.abuseipdb.com/api/v2/check";

/// Report window requested from the reputation service.
pub const DEFAULT_MAX_AGE_DAYS: u32 = 90;

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("reputation lookups are disabled")]
    Disabled,

    #[error("reputation service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("reputation service answered {status}: {message}")]
    Service { status: u16, message: String },

    #[error("reputation response carried no data")]
    NoData,
}

/// Reputation attributes for one address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationReport {
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub abuse_confidence_score: u32,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub total_reports: u64,
}

impl ReputationReport {
    /// Merge the report into a login trust context.
    pub fn apply_to(&self, ctx: &mut TrustContext) {
        ctx.extend([
            ("countryCode", Value::from(self.country_code.clone())),
            ("abuseConfidenceScore", Value::from(self.abuse_confidence_score)),
            ("domain", Value::from(self.domain.clone())),
            ("totalReports", Value::from(self.total_reports)),
        ]);
    }
}

/// Scoring oracle for caller addresses.
#[async_trait]
pub trait ReputationOracle: Send + Sync {
    async fn check(&self, ip: &str) -> Result<ReputationReport, ReputationError>;
}

/// Oracle used when no API key is configured. Every lookup fails, which the
/// login flow treats as a clean address.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledReputation;

#[async_trait]
impl ReputationOracle for DisabledReputation {
    async fn check(&self, _ip: &str) -> Result<ReputationReport, ReputationError> {
        Err(ReputationError::Disabled)
    }
}

/// Client for the AbuseIPDB `check` API.
pub struct AbuseIpDbClient {
    url: String,
    api_key: String,
    max_age_days: u32,
    http: reqwest::Client,
}

impl AbuseIpDbClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            url: ABUSEIPDB_CHECK_URL.to_string(),
            api_key: api_key.into(),
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            http,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = days;
        self
    }
}

#[derive(Deserialize)]
struct Envelope {
    data: Option<ReputationReport>,
    error: Option<Value>,
    errors: Option<Value>,
}

#[async_trait]
impl ReputationOracle for AbuseIpDbClient {
    async fn check(&self, ip: &str) -> Result<ReputationReport, ReputationError> {
        let max_age = self.max_age_days.to_string();
        let response = self
            .http
            .get(&self.url)
            .query(&[("ipAddress", ip), ("maxAgeInDays", max_age.as_str())])
            .header("Accept", "application/json")
            .header("Key", &self.api_key)
            .send()
            .await?;

        let status = response.status().as_u16();
        let envelope: Envelope = response.json().await?;

        if let Some(report) = envelope.data {
            debug!(ip, score = report.abuse_confidence_score, "reputation lookup succeeded");
            return Ok(report);
        }
        match envelope.error.or(envelope.errors) {
            Some(detail) => Err(ReputationError::Service {
                status,
                message: detail.to_string(),
            }),
            None => Err(ReputationError::NoData),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> AbuseIpDbClient {
        AbuseIpDbClient::new(reqwest::Client::new(), "secret-key")
            .with_url(format!("{}/api/v2/check", server.uri()))
    }

    #[tokio::test]
    async fn parses_report_and_sends_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/check"))
            .and(query_param("ipAddress", "198.51.100.4"))
            .and(query_param("maxAgeInDays", "90"))
            .and(header("Key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "ipAddress": "198.51.100.4",
                    "countryCode": "NL",
                    "abuseConfidenceScore": 12,
                    "domain": "example.net",
                    "totalReports": 3,
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = client_for(&server).await.check("198.51.100.4").await.unwrap();
        assert_eq!(report.country_code.as_deref(), Some("NL"));
        assert_eq!(report.abuse_confidence_score, 12);
        assert_eq!(report.total_reports, 3);
    }

    #[tokio::test]
    async fn error_body_is_a_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errors": [{"detail": "Authentication failed."}]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.check("198.51.100.4").await.unwrap_err();
        assert!(matches!(err, ReputationError::Service { status: 401, .. }), "{err}");
    }

    #[tokio::test]
    async fn disabled_oracle_always_fails() {
        let err = DisabledReputation.check("198.51.100.4").await.unwrap_err();
        assert!(matches!(err, ReputationError::Disabled));
    }

    #[test]
    fn report_is_merged_into_context() {
        let mut ctx = TrustContext::new();
        ReputationReport {
            country_code: Some("DE".to_string()),
            abuse_confidence_score: 7,
            domain: None,
            total_reports: 1,
        }
        .apply_to(&mut ctx);

        assert_eq!(ctx.get_str("countryCode"), Some("DE"));
        assert_eq!(ctx.get("abuseConfidenceScore"), Some(&json!(7)));
        assert_eq!(ctx.get("domain"), Some(&Value::Null));
        assert_eq!(ctx.get("totalReports"), Some(&json!(1)));
    }
}
