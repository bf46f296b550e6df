//! HTTP surface of the authorization broker.

use std::sync::Arc;

use domain::AuthFlow;
use log::*;
use service::config::Config;
use tokio::net::TcpListener;

mod controller;
pub mod error;
mod params;
mod response;
pub mod router;

pub use error::{Error, WebErrorKind};

// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub flow: Arc<AuthFlow>,
}

impl AppState {
    pub fn new(config: Config, flow: Arc<AuthFlow>) -> Self {
        Self { config, flow }
    }
}

/// Bind the configured interface and port and serve until Ctrl-C.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let server_url = format!("{}:{}", interface, app_state.config.port);

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(listener, router::define_routes(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received, draining connections");
}
