//! Append-only structured JSON-lines audit trail for the edge node.
//!
//! Every enforcement decision the gateway takes (trust granted or denied,
//! Trust Engine unreachable, session issued or revoked, request forwarded)
//! is recorded as a single newline-terminated JSON object. The trail is kept
//! separate from the `tracing` output so that it can be shipped and retained
//! independently of diagnostic logs.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_log::{AuditEntry, AuditEventType, AuditSink, RequestSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = AuditSink::start("/var/log/edge-node/audit.jsonl").await?;
//!
//! sink.log(AuditEntry::new(
//!     AuditEventType::GatewayStarted,
//!     RequestSource::new("edge-node"),
//!     serde_json::json!({"version": "0.1.0"}),
//! ))
//! .await;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod sink;
pub mod writer;

pub use entry::{AuditEntry, AuditEventType, DecisionRecord, RequestSource};
pub use sink::AuditSink;
pub use writer::{AuditWriteError, AuditWriter};
