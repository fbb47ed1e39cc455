use anyhow::{Context, Result};
use facecmp_core::{Comparer, ComparisonPipeline};
use facecmp_rekognition::RekognitionClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod routes;

use config::Config;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("facecmpd starting");

    let config = Config::from_env()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        api_prefix = %config.api_v1_str,
        max_file_size_mb = config.max_file_size_mb,
        provider_timeout_secs = config.provider_timeout_secs,
        region = %config.aws_region,
        "configuration loaded"
    );

    let client = RekognitionClient::new(config.rekognition_config())
        .context("failed to build Rekognition client")?;
    let comparer = Comparer::new(Arc::new(client), config.provider_timeout());
    let pipeline = ComparisonPipeline::new(config.validation_limits(), comparer);
    let state = AppState::new(pipeline, &config.project_name, &config.api_v1_str);
    let app = routes::router(state, config.body_limit_bytes());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "facecmpd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facecmpd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
