//! # net-guard
//!
//! Builds the outbound HTTP transport shared by every call the edge node
//! makes to the Trust Engine and the backend. When a CA certificate is
//! configured the client trusts that certificate only and the built-in root
//! store is switched off.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use net_guard::{pinned_client, TransportConfig};
//!
//! # fn example() -> Result<(), net_guard::TransportError> {
//! let config = TransportConfig {
//!     ca_cert: Some("cert.pem".into()),
//!     timeout_secs: None,
//! };
//! let client = pinned_client(&config)?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod transport;

pub use transport::{pinned_client, TransportConfig, TransportError};
