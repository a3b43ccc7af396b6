mod cli;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use audit_log::{AuditEntry, AuditEventType, AuditSink, RequestSource};
use pep_gateway::{
    spawn_sweeper, BackendForwarder, Gateway, GatewayConfig, GatewayState, InMemorySessionStore,
    SessionManager, SessionStore,
};
use trust_engine_client::{AbuseIpDbClient, DisabledReputation, ReputationOracle, TrustEngineClient};

use crate::cli::Cli;
use crate::config::Config;

/// Environment variable that supplies the reputation API key when the
/// configuration file does not.
const REPUTATION_KEY_ENV: &str = "EDGE_NODE_REPUTATION_KEY";

fn apply_overrides(cfg: &mut Config, cli: &Cli, env_key: Option<String>) {
    if let Some(ref listen) = cli.listen {
        cfg.network.listen_addr = listen.clone();
    }
    if let Some(ref url) = cli.backend_url {
        cfg.backend.url = url.clone();
    }
    if let Some(ref url) = cli.trust_engine_url {
        cfg.trust_engine.url = url.clone();
    }
    if let Some(ref cert) = cli.ca_cert {
        cfg.tls.ca_cert = Some(cert.clone());
    }
    if cfg.reputation.api_key.is_none() {
        cfg.reputation.api_key = env_key.filter(|key| !key.is_empty());
    }
}

/// The reputation service is public, so it is reached with the platform
/// roots rather than the pinned transport.
fn reputation_oracle(cfg: &Config) -> Result<Arc<dyn ReputationOracle>> {
    let Some(ref api_key) = cfg.reputation.api_key else {
        warn!("no reputation API key configured; login requests are not screened by IP reputation");
        return Ok(Arc::new(DisabledReputation));
    };

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = cfg.tls.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let http = builder
        .build()
        .context("failed to build reputation HTTP client")?;

    Ok(Arc::new(
        AbuseIpDbClient::new(http, api_key.clone())
            .with_url(cfg.reputation.url.clone())
            .with_max_age_days(cfg.reputation.max_age_days),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received SIGINT (ctrl-c)");
        }
        _ = terminate => {
            info!("received SIGTERM");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI and environment overrides.
    let mut cfg = config::load(&cli.config)?;
    apply_overrides(&mut cfg, &cli, std::env::var(REPUTATION_KEY_ENV).ok());

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        listen = %cfg.network.listen_addr,
        trust_engine = %cfg.trust_engine.url,
        backend = %cfg.backend.url,
        "edge-node starting"
    );

    // 4. Start audit logger.
    let (audit, audit_handle) = match &cfg.logging.audit_log_path {
        Some(path) => {
            let (sink, handle) = AuditSink::start(path)
                .await
                .context("failed to start audit logger")?;
            (sink, Some(handle))
        }
        None => {
            info!("audit log disabled");
            (AuditSink::disabled(), None)
        }
    };

    // 5. Outbound collaborators.
    let http = net_guard::pinned_client(&cfg.tls).context("failed to build outbound transport")?;
    let trust_engine = TrustEngineClient::new(
        cfg.trust_engine.url.clone(),
        http.clone(),
        reputation_oracle(&cfg)?,
    )
    .with_reputation_threshold(cfg.trust_engine.reputation_threshold);
    let forwarder = BackendForwarder::new(cfg.backend.url.clone(), http);

    // 6. Sessions and the expiry sweeper.
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let lifetime = cfg
        .session
        .lifetime()
        .context("invalid session lifetime")?;
    let sessions = SessionManager::new(Arc::clone(&store), lifetime)
        .with_secure_cookie(cfg.session.secure_cookie);
    let sweeper = spawn_sweeper(store, Duration::from_secs(cfg.session.sweep_interval_secs));

    info!(
        lifetime_minutes = cfg.session.lifetime_minutes,
        secure_cookie = cfg.session.secure_cookie,
        "session manager configured"
    );

    // 7. Gateway.
    let listen_addr: SocketAddr = cfg
        .network
        .listen_addr
        .parse()
        .context("invalid listen address")?;
    let state = GatewayState::new(trust_engine, forwarder, sessions, audit.clone())
        .with_max_body_bytes(cfg.network.max_body_bytes);
    let gateway = Gateway::new(GatewayConfig { listen_addr, state });

    audit
        .log(AuditEntry::new(
            AuditEventType::GatewayStarted,
            RequestSource::new("edge-node"),
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config_file": cli.config.display().to_string(),
                "listen": listen_addr.to_string(),
            }),
        ))
        .await;

    // 8. Serve until SIGINT/SIGTERM.
    let result = gateway.run(shutdown_signal()).await;
    sweeper.abort();

    // 9. Log shutdown.
    info!("edge-node shutting down");

    audit
        .log(AuditEntry::new(
            AuditEventType::GatewayStopped,
            RequestSource::new("edge-node"),
            serde_json::json!({
                "result": format!("{:?}", result),
            }),
        ))
        .await;

    drop(audit);
    if let Some(handle) = audit_handle {
        if let Err(err) = handle.await {
            warn!(%err, "audit writer task failed");
        }
    }

    result
}
