use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "edge-node", version, about = "Zero-trust policy enforcement gateway")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen address (overrides config file setting)
    #[arg(long)]
    pub listen: Option<String>,

    /// Backend base URL (overrides config file setting)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Trust Engine base URL (overrides config file setting)
    #[arg(long)]
    pub trust_engine_url: Option<String>,

    /// PEM certificate that outbound TLS peers must chain to
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_config_yaml() {
        let cli = Cli::parse_from(["edge-node"]);
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(cli.listen.is_none());
        assert!(cli.ca_cert.is_none());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::parse_from([
            "edge-node",
            "-c",
            "/etc/edge-node.yaml",
            "--listen",
            "127.0.0.1:8080",
            "--backend-url",
            "https://backend.internal:8443",
            "--trust-engine-url",
            "https://trust.internal:9443",
            "--ca-cert",
            "/etc/edge-node/ca.pem",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/edge-node.yaml"));
        assert_eq!(cli.listen.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(cli.backend_url.as_deref(), Some("https://backend.internal:8443"));
        assert_eq!(cli.trust_engine_url.as_deref(), Some("https://trust.internal:9443"));
        assert_eq!(cli.ca_cert, Some(PathBuf::from("/etc/edge-node/ca.pem")));
    }
}
