use axum::Router;
use std::net::SocketAddr;
use tracing::{error, info};

mod api;
mod config;
mod models;
mod services;
mod validation;

use api::handlers::AppState;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load from .env file
    let _ = dotenv::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(
        "Logging level {} (style {})",
        config.logging.level, config.logging.style
    );

    let state = AppState::from_config(&config).map_err(|e| {
        error!("Invalid converter configuration: {}", e);
        e
    })?;
    info!(
        "Converter defaults: policy={}, target={}, pretty={}, validate_output={}",
        state.converter.defaults().policy.as_str(),
        state.converter.defaults().target.as_str(),
        state.converter.defaults().pretty,
        state.converter.defaults().validate_output,
    );

    // Create router with state
    let app: Router = api::routes::create_router(state);

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
