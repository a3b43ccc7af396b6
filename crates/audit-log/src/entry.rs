use serde::{Deserialize, Serialize};

/// A single audit record describing one enforcement event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    pub source: RequestSource,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionRecord>,
}

impl AuditEntry {
    /// Create an entry stamped with a fresh UUID v4 and the current UTC time.
    pub fn new(
        event_type: AuditEventType,
        source: RequestSource,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            event_type,
            source,
            details,
            decision: None,
        }
    }

    /// Attach the decision that produced this event.
    pub fn with_decision(mut self, decision: DecisionRecord) -> Self {
        self.decision = Some(decision);
        self
    }
}

/// Category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    GatewayStarted,
    GatewayStopped,
    TrustDataMissing,
    TrustGranted,
    TrustDenied,
    /// The Trust Engine could not be reached or answered garbage. Enforced
    /// as a denial but recorded separately.
    TrustEngineUnavailable,
    SessionIssued,
    SessionRevoked,
    LoginRedirected,
    IntentUnsupported,
    RequestForwarded,
    BackendFailed,
}

/// Where an event originated: the gateway component plus whatever is known
/// about the inbound request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestSource {
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl RequestSource {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Self::default()
        }
    }

    pub fn with_request(
        mut self,
        request_id: impl Into<String>,
        remote_addr: Option<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.request_id = Some(request_id.into());
        self.remote_addr = remote_addr;
        self.resource = Some(resource.into());
        self.action = Some(action.into());
        self
    }
}

/// The decision attached to an audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Classified request intent (`generic`, `login`, ...).
    pub intent: String,
    /// `granted`, `denied` or `unavailable`.
    pub outcome: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_serialize_as_snake_case() {
        let json = serde_json::to_string(&AuditEventType::TrustEngineUnavailable).unwrap();
        assert_eq!(json, "\"trust_engine_unavailable\"");
    }

    #[test]
    fn empty_source_fields_are_omitted() {
        let entry = AuditEntry::new(
            AuditEventType::GatewayStarted,
            RequestSource::new("edge-node"),
            serde_json::json!({}),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["source"], serde_json::json!({"component": "edge-node"}));
        assert!(value.get("decision").is_none());
    }

    #[test]
    fn decision_is_serialized_when_attached() {
        let entry = AuditEntry::new(
            AuditEventType::TrustDenied,
            RequestSource::new("pep").with_request(
                "req-1",
                Some("10.0.0.1".to_string()),
                "/orders",
                "POST",
            ),
            serde_json::json!({}),
        )
        .with_decision(DecisionRecord {
            intent: "generic".to_string(),
            outcome: "denied".to_string(),
            reason: "Trust Engine Denied Access".to_string(),
        });

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["decision"]["outcome"], "denied");
        assert_eq!(value["source"]["resource"], "/orders");
        assert_eq!(value["source"]["remote_addr"], "10.0.0.1");
    }
}
