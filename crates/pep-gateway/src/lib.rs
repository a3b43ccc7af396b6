//! HTTP Policy Enforcement Point.
//!
//! Every inbound request is turned into a trust context, classified, and
//! submitted to the Trust Engine before anything reaches a backend.
//!
//! # Architecture
//!
//! ```text
//! Client  --HTTP-->  pep-gateway  --HTTPS-->  Backend
//!                       |    \
//!                       |     \--HTTPS-->  Trust Engine  --> IP reputation (login)
//!                 [Session store]
//!                       |
//!                  [Audit sink]
//! ```
//!
//! Authorized generic requests are replayed against the backend and its
//! reply is relayed unchanged. Login, logout and register requests are
//! answered by the gateway itself; a successful login issues a session whose
//! key travels in the `sessionKey` cookie, letting browsers make later
//! requests without an explicit trust payload.

mod audit;
pub mod entry;
pub mod error;
pub mod forwarder;
pub mod server;
pub mod session;
pub mod state;
pub mod verification;

#[cfg(test)]
mod testing;

pub use error::PepError;
pub use forwarder::{BackendForwarder, BackendReply};
pub use server::{router, Gateway, GatewayConfig};
pub use session::{
    spawn_sweeper, InMemorySessionStore, IssuedSession, SessionManager, SessionRecord,
    SessionStore, DEFAULT_SESSION_LIFETIME_MINUTES, SESSION_COOKIE,
};
pub use state::{GatewayState, DEFAULT_MAX_BODY_BYTES};
