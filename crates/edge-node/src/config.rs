use net_guard::TransportConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use trust_engine_client::{ABUSEIPDB_CHECK_URL, DEFAULT_MAX_AGE_DAYS, DEFAULT_REPUTATION_THRESHOLD};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub trust_engine: TrustEngineConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub tls: TransportConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen")]
    pub listen_addr: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrustEngineConfig {
    #[serde(default = "default_trust_engine_url")]
    pub url: String,
    /// Reputation scores above this deny a login outright.
    #[serde(default = "default_reputation_threshold")]
    pub reputation_threshold: u32,
}

impl Default for TrustEngineConfig {
    fn default() -> Self {
        Self {
            url: default_trust_engine_url(),
            reputation_threshold: default_reputation_threshold(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReputationConfig {
    #[serde(default = "default_reputation_url")]
    pub url: String,
    /// Without a key the lookup is skipped and every caller scores 0.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            url: default_reputation_url(),
            api_key: None,
            max_age_days: default_max_age_days(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_lifetime_minutes")]
    pub lifetime_minutes: i64,
    #[serde(default)]
    pub secure_cookie: bool,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_minutes: default_lifetime_minutes(),
            secure_cookie: false,
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON-lines audit trail; auditing is off when unset.
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            audit_log_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_listen() -> String {
    "0.0.0.0:5005".to_string()
}

fn default_max_body_bytes() -> usize {
    pep_gateway::DEFAULT_MAX_BODY_BYTES
}

fn default_trust_engine_url() -> String {
    "https://127.0.0.1:5001".to_string()
}

fn default_reputation_threshold() -> u32 {
    DEFAULT_REPUTATION_THRESHOLD
}

fn default_backend_url() -> String {
    "https://127.0.0.1:5002".to_string()
}

fn default_reputation_url() -> String {
    ABUSEIPDB_CHECK_URL.to_string()
}

fn default_max_age_days() -> u32 {
    DEFAULT_MAX_AGE_DAYS
}

fn default_lifetime_minutes() -> i64 {
    pep_gateway::DEFAULT_SESSION_LIFETIME_MINUTES
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config file {}: {e}", path.display()))?;
    Ok(config)
}

impl Config {
    /// Reject values that would make the gateway unusable.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.session.lifetime()?;
        Ok(())
    }
}

impl SessionConfig {
    /// Configured lifetime as a duration; must be positive and representable.
    pub fn lifetime(&self) -> anyhow::Result<chrono::Duration> {
        if self.lifetime_minutes <= 0 {
            anyhow::bail!(
                "session.lifetime_minutes must be positive, got {}",
                self.lifetime_minutes
            );
        }
        chrono::Duration::try_minutes(self.lifetime_minutes).ok_or_else(|| {
            anyhow::anyhow!(
                "session.lifetime_minutes is out of range: {}",
                self.lifetime_minutes
            )
        })
    }
}
