use audit_log::{AuditEntry, AuditEventType, AuditSink, DecisionRecord, RequestSource};
use serde_json::Value;
use trust_context::{RequestFacts, RequestIntent};
use trust_engine_client::Verdict;

/// Audit handle bound to one inbound request.
pub(crate) struct RequestAudit {
    sink: AuditSink,
    source: RequestSource,
}

impl RequestAudit {
    pub(crate) fn new(sink: &AuditSink, request_id: &str, facts: &RequestFacts) -> Self {
        let source = RequestSource::new("pep-gateway").with_request(
            request_id,
            facts.ip.map(|ip| ip.to_string()),
            facts.resource.clone(),
            facts.action.clone(),
        );
        Self {
            sink: sink.clone(),
            source,
        }
    }

    pub(crate) async fn event(&self, event_type: AuditEventType, details: Value) {
        self.sink
            .log(AuditEntry::new(event_type, self.source.clone(), details))
            .await;
    }

    /// Record a Trust Engine verdict. An unreachable engine gets its own
    /// event type even though it is enforced as a denial.
    pub(crate) async fn verdict<T>(&self, intent: RequestIntent, verdict: &Verdict<T>) {
        let event_type = match verdict {
            Verdict::Granted(_) => AuditEventType::TrustGranted,
            Verdict::Denied { .. } => AuditEventType::TrustDenied,
            Verdict::Unavailable { .. } => AuditEventType::TrustEngineUnavailable,
        };
        let record = DecisionRecord {
            intent: intent.to_string(),
            outcome: verdict.outcome().to_string(),
            reason: verdict.reason().unwrap_or("granted").to_string(),
        };
        self.sink
            .log(
                AuditEntry::new(event_type, self.source.clone(), Value::Null)
                    .with_decision(record),
            )
            .await;
    }
}
