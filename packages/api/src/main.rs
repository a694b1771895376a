use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use shared::config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;
    if config.ai.token.is_none() {
        warn!("GITHUB_TOKEN not set, AI opponents will play random moves");
    }

    let app_state = AppState::from_config(&config).await;

    // Requests left over from a previous run
    match app_state.match_request_service.reconcile_expired().await {
        Ok(removed) => info!(removed, "Reconciled expired match requests"),
        Err(e) => warn!(error = %e, "Could not reconcile expired match requests"),
    }

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    info!(address = %config.bind_address, "Listening");
    axum::serve(listener, routes::app(app_state)).await?;
    Ok(())
}
