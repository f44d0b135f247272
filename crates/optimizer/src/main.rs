//! Fleet Optimizer - predictive optimization daemon for an MCP service fleet
//!
//! Runs forecasting, adaptive caching, auto-scaling and predictive
//! monitoring loops, and serves health, metrics and dashboard queries.

use anyhow::Result;
use fleet_lib::{system_clock, Orchestrator};
use fleet_optimizer::{api, config::DaemonConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting fleet-optimizer");

    let config = DaemonConfig::load()?;
    info!(
        instance = %config.instance,
        services = config.optimizer.orchestrator.services.len(),
        api_port = config.api_port,
        "Optimizer configured"
    );

    let orchestrator = Arc::new(Orchestrator::new(config.optimizer, system_clock())?);
    orchestrator.initialize().await?;

    let app_state = Arc::new(api::AppState::new(orchestrator.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let reason = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            "SIGINT received"
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => warn!("API server exited"),
                Ok(Err(e)) => warn!(error = %e, "API server failed"),
                Err(e) => warn!(error = %e, "API server task panicked"),
            }
            "API server stopped"
        }
    };

    orchestrator.shutdown(reason).await;
    info!("Shutting down");

    Ok(())
}
