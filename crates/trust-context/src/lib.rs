//! # trust-context
//!
//! Pure, I/O-free half of the enforcement pipeline: pulling the
//! caller-supplied trust payload out of a request body, overwriting the
//! enforcement-relevant facts the gateway observed itself, and classifying
//! the request into a [`RequestIntent`].
//!
//! ## Quick start
//!
//! ```rust
//! use trust_context::{builder, RequestFacts, RequestIntent};
//!
//! let body = serde_json::json!({
//!     "_trustData": {"user": "alice", "ip": "6.6.6.6"},
//!     "item": "book",
//! });
//! let facts = RequestFacts::new(Some("10.0.0.7".parse().unwrap()), "/orders", "POST");
//! let extracted = builder::from_body(body, &facts).unwrap();
//!
//! assert_eq!(extracted.context.get_str("ip"), Some("10.0.0.7"));
//! assert_eq!(extracted.payload["item"], "book");
//! assert_eq!(RequestIntent::classify(&extracted.context), RequestIntent::Generic);
//! ```

pub mod builder;
mod context;
mod error;
mod intent;

pub use builder::{Extracted, RequestFacts};
pub use context::{keys, ContextDump, TrustContext, TRUST_DATA_KEY};
pub use error::ContextError;
pub use intent::RequestIntent;
