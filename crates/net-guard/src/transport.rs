use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to read pinned certificate {path}: {source}")]
    ReadCertificate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("pinned certificate {path} is not valid PEM: {source}")]
    InvalidCertificate {
        path: PathBuf,
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Outbound transport settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportConfig {
    /// PEM certificate that outbound TLS peers must chain to. `None` falls
    /// back to the platform roots.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    /// Whole-request timeout. `None` keeps the client default (no timeout).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Build the shared [`reqwest::Client`].
///
/// The client is cheap to clone and is meant to be constructed once at
/// startup and handed to every outbound collaborator.
pub fn pinned_client(config: &TransportConfig) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder();

    match &config.ca_cert {
        Some(path) => {
            let pem = std::fs::read(path).map_err(|source| TransportError::ReadCertificate {
                path: path.clone(),
                source,
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|source| {
                TransportError::InvalidCertificate {
                    path: path.clone(),
                    source,
                }
            })?;
            builder = builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(cert);
            info!(ca_cert = %path.display(), "outbound transport pinned to certificate");
        }
        None => {
            warn!("no pinned certificate configured; outbound TLS uses the platform roots");
        }
    }

    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build().map_err(TransportError::Build)
}
