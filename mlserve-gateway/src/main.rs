//! MLServe gateway binary.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;

use mlserve_gateway::{app, logging, AppState, Config};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("mlserve-gateway {}", VERSION);
        return Ok(());
    }

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Check config.toml or the MLSERVE__SECTION__KEY environment variables.",
            e
        )
    })?;

    logging::init(&config.logging.level);
    tracing::info!("Starting MLServe gateway {}", VERSION);

    let state = Arc::new(AppState::new(config.clone()));
    state.deploy_configured_models().await;

    // Background tasks: health sweep and cluster status polling
    let health_monitor = state.health_monitor.clone();
    let health_task = tokio::spawn(async move { health_monitor.run().await });

    let status_aggregator = state.status_aggregator.clone();
    let status_task = tokio::spawn(async move { status_aggregator.run().await });
    match config.cluster.resources_url.as_deref() {
        Some(url) => tracing::info!("Polling cluster resources from {}", url),
        None => tracing::warn!("No cluster resources URL configured, cluster status will report offline"),
    }

    let addr = format!("{}:{}", config.api.host, config.api.port);
    tracing::info!("Listening on {} (API prefix {})", addr, config.api.prefix);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    health_task.abort();
    status_task.abort();
    tracing::info!("MLServe gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
