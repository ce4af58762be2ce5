//! Hireline Edge - route guard and role cookie server
//!
//! This is the main entry point for the edge service. It guards page routes
//! using the `user-roles` cookie and writes that cookie from roles the API
//! confirms.
//!
//! # Configuration
//!
//! Read from the environment; see [`EdgeConfig::from_env`]. `API_BASE_URL`
//! points at the marketplace API used to confirm roles.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hireline_edge::{create_router, EdgeConfig, EdgeState, HttpRoleResolver};
use hireline_http::{ClientConfig, HttpGateway, NoToken};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hireline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Hireline Edge");

    let config = EdgeConfig::from_env();
    tracing::info!(
        listen_addr = %config.listen_addr,
        api_base_url = %config.api_base_url,
        identity_endpoint = %config.identity_endpoint,
        cookie_secure = config.cookie_secure,
        cookie_secret_set = config.cookie_secret.is_some(),
        cors_origins = ?config.cors_origins,
        "Edge configuration loaded"
    );

    // The edge forwards each caller's own token; it holds none itself.
    let client_config = ClientConfig {
        base_url: config.api_base_url.clone(),
        request_timeout_ms: config.request_timeout_seconds * 1000,
        cookie_store: false,
    };
    let gateway = HttpGateway::new(client_config, Arc::new(NoToken))?;
    let resolver = Arc::new(HttpRoleResolver::new(
        gateway,
        config.identity_endpoint.clone(),
    ));
    tracing::info!("Role resolver initialized");

    let listen_addr = config.listen_addr.clone();
    let state = EdgeState::new(resolver, config)?;

    // No renderer is mounted here; pages that pass the guard fall through
    // to the not-found handler.
    let app = create_router(state, None);
    tracing::info!("Router configured");

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
