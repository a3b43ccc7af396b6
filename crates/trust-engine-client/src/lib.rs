//! # trust-engine-client
//!
//! Protocol adapter between the edge node and its Policy Decision Point.
//! Every operation submits a [`TrustContext`](trust_context::TrustContext)
//! to one Trust Engine endpoint and interprets the reply as a [`Verdict`].
//! Login additionally consults a [`ReputationOracle`] before the Trust
//! Engine is contacted.
//!
//! A transport failure is never a grant: it comes back as
//! [`Verdict::Unavailable`], which callers enforce exactly like
//! [`Verdict::Denied`] while keeping the two apart in logs and audit.

mod client;
pub mod reputation;
mod verdict;

pub use client::{Endpoint, TrustEngineClient, DEFAULT_REPUTATION_THRESHOLD};
pub use reputation::{
    AbuseIpDbClient, DisabledReputation, ReputationError, ReputationOracle, ReputationReport,
    ABUSEIPDB_CHECK_URL, DEFAULT_MAX_AGE_DAYS,
};
pub use verdict::{LoginGrant, TrustLevel, Verdict, DENIED_BY_ENGINE, LOW_IP_REPUTATION};
