//! Credit Score API - credit risk tier classification service
//!
//! Resolves a model once at startup (registry, known runs, local file or
//! the rule-based fallback) and serves predictions over HTTP.

use anyhow::Result;
use credit_score_api::{api, config::ServiceConfig};
use scoring_lib::{
    health::{components, HealthRegistry},
    observability::{ScoringMetrics, StructuredLogger},
    registry::{MlflowClient, ModelResolver},
    telemetry::{DriftLogSink, MetricsSink},
    RequestHandler,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting credit-score-api");

    let config = ServiceConfig::load()?;
    info!(
        service = %config.service_name,
        model_name = %config.model_name,
        force_remote = config.force_remote,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TELEMETRY).await;

    let metrics = ScoringMetrics::new();
    let logger = StructuredLogger::new(&config.service_name);

    let mut resolver = ModelResolver::new(config.resolver_config());
    match config.mlflow_config().map(MlflowClient::new) {
        Some(Ok(client)) => {
            info!(tracking_uri = %client.tracking_uri(), "Model registry configured");
            resolver = resolver.with_registry(Arc::new(client));
        }
        Some(Err(e)) => warn!(error = %e, "Model registry unavailable, remote tiers disabled"),
        None => warn!("No tracking URI configured, remote tiers disabled"),
    }

    // Fatal only in remote-only mode
    let context = resolver.resolve().await?;
    let descriptor = context.descriptor().clone();
    logger.log_model_resolved(&descriptor);
    metrics.set_model_info(&descriptor);
    health_registry.model_resolved(&descriptor).await;

    let handler = RequestHandler::new(context)
        .with_metrics(metrics.clone())
        .with_health(health_registry.clone())
        .with_sink(Arc::new(MetricsSink::new(metrics.clone())))
        .with_sink(Arc::new(DriftLogSink::new(logger.clone())));

    let app_state = Arc::new(api::AppState::new(
        config.service_name.clone(),
        handler,
        health_registry,
    ));

    logger.log_startup(SERVICE_VERSION, config.api_port);
    api::serve(config.api_port, app_state, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
