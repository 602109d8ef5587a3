//! Entry point for the `atelier-gateway` HTTP server.

use std::sync::Arc;

use atelier_gateway::auth::{Authenticator, OpenAuth, TokenAuth};
use atelier_gateway::config::GatewayConfig;
use atelier_gateway::server::{serve, AppState};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env();
    let auth: Arc<dyn Authenticator> = match &config.auth_token {
        Some(token) => Arc::new(TokenAuth::new(token.clone())),
        None => Arc::new(OpenAuth),
    };
    let addr = config.listen_addr.clone();
    let state = AppState::new(config, auth);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %addr, "atelier-gateway listening");

    tokio::select! {
        result = serve(listener, Arc::clone(&state)) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            if let Err(e) = state.supervisor.dispose().await {
                tracing::warn!(error = %e, "worker did not shut down cleanly");
            }
        }
    }
}
