//! Route table and listener.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::entry::enforce;
use crate::state::GatewayState;
use crate::verification::{
    login_entry, login_page, login_submit, login_success, LOGIN_ENTRY, LOGIN_PAGE, LOGIN_SUBMIT,
    LOGIN_SUCCESS,
};

/// Build the gateway router. The verification routes only claim their own
/// method; every other method on those paths, and every other path, goes
/// through [`enforce`].
///
/// CORS preflights are answered before routing, and every response carries
/// `Access-Control-Allow-Origin`.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route(LOGIN_ENTRY, get(login_entry).fallback(enforce))
        .route(LOGIN_PAGE, get(login_page).fallback(enforce))
        .route(LOGIN_SUBMIT, post(login_submit).fallback(enforce))
        .route(LOGIN_SUCCESS, get(login_success).fallback(enforce))
        .fallback(enforce)
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub struct GatewayConfig {
    /// Address to bind the listening socket to.
    pub listen_addr: SocketAddr,
    pub state: GatewayState,
}

/// The enforcement point's HTTP server.
pub struct Gateway {
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn router(&self) -> Router {
        router(self.config.state.clone())
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "pep-gateway listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!("pep-gateway stopped");
        Ok(())
    }
}
