//! Health check infrastructure for the scoring service
//!
//! Tracks component health for liveness and readiness probes.

use crate::models::{ModelDescriptor, ModelOrigin};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }

    /// Health of the serving model; the mock fallback is operational but degraded
    pub fn for_model(descriptor: &ModelDescriptor) -> Self {
        match descriptor.origin {
            ModelOrigin::Mock => Self::degraded("serving rule-based mock model"),
            _ => Self::healthy(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const MODEL: &str = "model";
    pub const TELEMETRY: &str = "telemetry";
}

/// Registry of component health shared between the service and its probes
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Record the resolved model and mark the service ready
    pub async fn model_resolved(&self, descriptor: &ModelDescriptor) {
        self.update(components::MODEL, ComponentHealth::for_model(descriptor))
            .await;
        self.set_ready(true).await;
    }

    /// Record the outcome of one telemetry delivery.
    ///
    /// Synchronous so the request path can call it; skipped while the
    /// registry is locked, the next delivery reports again.
    pub fn telemetry_delivered(&self, failed_sinks: &[&str]) {
        let health = if failed_sinks.is_empty() {
            ComponentHealth::healthy()
        } else {
            ComponentHealth::degraded(format!(
                "telemetry sink failing: {}",
                failed_sinks.join(", ")
            ))
        };

        match self.components.try_write() {
            Ok(mut components) => {
                components.insert(components::TELEMETRY.to_string(), health);
            }
            Err(_) => debug!("Health registry busy, telemetry status not updated"),
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Model not yet resolved".to_string()),
            }
        } else if !health.status.is_operational() {
            ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::MockModel;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_mock_model_reports_degraded() {
        let registry = HealthRegistry::new();
        registry.model_resolved(&MockModel::descriptor()).await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::MODEL].message.as_deref(),
            Some("serving rule-based mock model")
        );
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_trained_model_reports_healthy() {
        let registry = HealthRegistry::new();
        let descriptor = ModelDescriptor::new("credit", "3", ModelOrigin::Registry);
        registry.model_resolved(&descriptor).await;
        registry.register(components::TELEMETRY).await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_not_ready_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register(components::TELEMETRY).await;
        registry.set_ready(true).await;
        registry.set_unhealthy(components::TELEMETRY, "Failed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
    }

    #[tokio::test]
    async fn test_telemetry_delivery_updates_component() {
        let registry = HealthRegistry::new();
        registry.register(components::TELEMETRY).await;

        registry.telemetry_delivered(&["metrics", "drift_log"]);
        let health = registry.health().await;
        let telemetry = &health.components[components::TELEMETRY];
        assert_eq!(telemetry.status, ComponentStatus::Degraded);
        assert_eq!(
            telemetry.message.as_deref(),
            Some("telemetry sink failing: metrics, drift_log")
        );
        assert!(registry.health().await.status.is_operational());

        registry.telemetry_delivered(&[]);
        let health = registry.health().await;
        assert_eq!(health.components[components::TELEMETRY].status, ComponentStatus::Healthy);
    }
}
