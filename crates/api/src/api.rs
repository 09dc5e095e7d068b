//! HTTP API: scoring, model identity, health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use scoring_lib::{
    health::{ComponentStatus, HealthRegistry},
    RequestHandler,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,
    pub handler: RequestHandler,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(
        service_name: impl Into<String>,
        handler: RequestHandler,
        health_registry: HealthRegistry,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            handler,
            health_registry,
        }
    }
}

/// Service summary with the active model identity
async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let descriptor = state.handler.descriptor();
    Json(json!({
        "status": "healthy",
        "service": state.service_name,
        "model": descriptor.model_name,
        "version": descriptor.version,
        "source": descriptor.origin,
    }))
}

/// Health check response - returns 200 if operational, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn model_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.handler.descriptor().clone())
}

/// Usage description for the scoring endpoint
async fn predict_usage() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/predict",
        "method": "POST",
        "content_type": "application/json",
        "example": {
            "data": {
                "Age": 35,
                "Annual_Income": 65000,
                "Monthly_Inhand_Salary": 5200,
                "Num_Bank_Accounts": 2,
                "Num_Credit_Card": 2,
                "Interest_Rate": 11.5,
                "Num_of_Loan": 1,
                "Outstanding_Debt": 8000,
                "Credit_Utilization_Ratio": 28.5,
                "Total_EMI_per_month": 950,
                "Amount_invested_monthly": 800,
                "Monthly_Balance": 3200,
                "Occupation": "Software Engineer",
                "Credit_Mix": "Good",
                "Payment_of_Min_Amount": "No",
                "Payment_Behaviour": "Low_spent_Medium_value_payments"
            }
        }
    }))
}

/// Score a client payload; the raw body is handed over as a gateway event
async fn predict(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let event = json!({
        "body": String::from_utf8_lossy(&body),
        "headers": {"Content-Type": "application/json"},
    });
    let response = state.handler.handle(&event);

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}

/// Lambda-style invocation: the body is the event, the reply a gateway response
async fn invoke(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let event = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    Json(state.handler.handle_gateway(&event))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/model-info", get(model_info))
        .route("/predict", get(predict_usage).post(predict))
        .route("/invoke", post(invoke))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
