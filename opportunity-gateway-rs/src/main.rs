// opportunity-gateway-rs/src/main.rs
// Opportunity Gateway - HTTP entry point for the opportunity pipeline
// Port 8000 by default (GATEWAY_PORT)

use std::net::SocketAddr;

use once_cell::sync::Lazy;
use opportunity_gateway::{create_router, AppState, GatewayConfig, START_TIME};
use opportunity_pipeline::config::DEFAULT_PROVIDER;
use opportunity_pipeline::{Orchestrator, PipelineConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Lazy::force(&START_TIME);

    let provider = &**DEFAULT_PROVIDER;
    let pipeline_config = match PipelineConfig::from_provider(provider) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid pipeline configuration: {}", err);
            std::process::exit(1);
        }
    };
    let gateway_config = match GatewayConfig::from_provider(provider) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid gateway configuration: {}", err);
            std::process::exit(1);
        }
    };

    tracing::info!(
        model = %pipeline_config.model,
        grounding = pipeline_config.grounding_enabled,
        retries = gateway_config.retry_attempts,
        "Starting opportunity gateway"
    );

    let orchestrator = Orchestrator::from_config(pipeline_config)?;
    let state = AppState::new(orchestrator).with_retry_attempts(gateway_config.retry_attempts);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], gateway_config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Opportunity gateway listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
