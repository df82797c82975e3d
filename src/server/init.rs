//! Server initialization and main run loop

use crate::api;
use crate::gateway::CompletionGateway;
use crate::server::AppConfig;
use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tally_llm::LlmRouter;
use tally_usage::{UsageReporter, UsageStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Build the application router with all endpoints and layers
pub fn app(gateway: Arc<CompletionGateway>, reporter: Arc<UsageReporter>) -> Router {
    Router::new()
        .route("/", get(|| async { "tally LLM gateway" }))
        .merge(api::health_routes())
        .merge(api::chat_routes())
        .merge(api::models_routes())
        .merge(api::usage_routes())
        .layer(Extension(gateway))
        .layer(Extension(reporter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the server until shutdown
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting tally v{}", env!("CARGO_PKG_VERSION"));

    let store = UsageStore::from_path(Path::new(&config.database.path))
        .await
        .context("Failed to open usage store")?;

    let llm_router = LlmRouter::from_config(&config.llm).context("Failed to build LLM router")?;
    info!(providers = ?llm_router.configured(), "LLM router initialized");

    let gateway = Arc::new(CompletionGateway::new(Arc::new(llm_router), store.clone()));
    let reporter = Arc::new(UsageReporter::new(store.clone()));

    let router = app(gateway, reporter);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Release the pool deterministically before exit
    store.close().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
