//! Observability infrastructure for the scoring service
//!
//! Provides:
//! - Prometheus metrics (classifications, confidence, inference latency,
//!   request outcomes, key feature values, active model identity)
//! - Structured JSON logging with tracing

use crate::models::{ModelDescriptor, NormalizedRecord, PredictionResult};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, GaugeVec, Histogram,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

const CONFIDENCE_BUCKETS: &[f64] = &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Features whose last observed value is exported as a gauge
pub const TRACKED_FEATURES: [&str; 2] = ["Annual_Income", "Credit_Utilization_Ratio"];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScoringMetricsInner> = OnceLock::new();

struct ScoringMetricsInner {
    predictions_total: IntCounterVec,
    prediction_confidence: Histogram,
    inference_latency_seconds: Histogram,
    requests_total: IntCounterVec,
    feature_value: GaugeVec,
    model_info: GaugeVec,
    telemetry_errors: IntCounterVec,
}

impl ScoringMetricsInner {
    fn new() -> Self {
        Self {
            predictions_total: register_int_counter_vec!(
                "credit_score_predictions_total",
                "Predictions served, by predicted tier and model version",
                &["classification", "model_version"]
            )
            .expect("Failed to register predictions_total"),

            prediction_confidence: register_histogram!(
                "credit_score_prediction_confidence",
                "Confidence of served predictions",
                CONFIDENCE_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_confidence"),

            inference_latency_seconds: register_histogram!(
                "credit_score_inference_latency_seconds",
                "Time spent running model inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            requests_total: register_int_counter_vec!(
                "credit_score_requests_total",
                "Scoring requests by response status",
                &["status"]
            )
            .expect("Failed to register requests_total"),

            feature_value: register_gauge_vec!(
                "credit_score_feature_value",
                "Last observed value of key input features",
                &["feature"]
            )
            .expect("Failed to register feature_value"),

            model_info: register_gauge_vec!(
                "credit_score_model_info",
                "Identity of the active model",
                &["model_name", "version", "origin"]
            )
            .expect("Failed to register model_info"),

            telemetry_errors: register_int_counter_vec!(
                "credit_score_telemetry_errors_total",
                "Telemetry sink failures, by sink",
                &["sink"]
            )
            .expect("Failed to register telemetry_errors"),
        }
    }
}

/// Scoring metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Debug, Clone)]
pub struct ScoringMetrics {
    _private: (),
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScoringMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScoringMetricsInner {
        GLOBAL_METRICS.get_or_init(ScoringMetricsInner::new)
    }

    pub fn record_prediction(&self, result: &PredictionResult, model_version: &str) {
        let inner = self.inner();
        inner
            .predictions_total
            .with_label_values(&[result.label.as_str(), model_version])
            .inc();
        if let Some(confidence) = result.confidence {
            inner.prediction_confidence.observe(confidence);
        }
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn inc_requests(&self, status: u16) {
        self.inner()
            .requests_total
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    pub fn set_feature_values(&self, record: &NormalizedRecord) {
        for feature in TRACKED_FEATURES {
            if let Some(value) = record.numeric(feature) {
                self.inner().feature_value.with_label_values(&[feature]).set(value);
            }
        }
    }

    /// Publish the active model; only one identity is exported at a time
    pub fn set_model_info(&self, descriptor: &ModelDescriptor) {
        let inner = self.inner();
        inner.model_info.reset();
        inner
            .model_info
            .with_label_values(&[
                &descriptor.model_name,
                &descriptor.version,
                descriptor.origin.as_str(),
            ])
            .set(1.0);
    }

    pub fn inc_telemetry_errors(&self, sink: &str) {
        self.inner().telemetry_errors.with_label_values(&[sink]).inc();
    }
}

/// Structured logger for service events
///
/// Emits consistent JSON-formatted events for startup, model resolution,
/// per-prediction drift records and shutdown.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn log_startup(&self, version: &str, port: u16) {
        info!(
            event = "service_started",
            service = %self.service_name,
            service_version = %version,
            port = port,
            "Credit score service started"
        );
    }

    pub fn log_model_resolved(&self, descriptor: &ModelDescriptor) {
        if descriptor.origin == crate::models::ModelOrigin::Mock {
            warn!(
                event = "model_resolved",
                service = %self.service_name,
                model_name = %descriptor.model_name,
                model_version = %descriptor.version,
                origin = %descriptor.origin,
                "Serving rule-based mock model"
            );
        } else {
            info!(
                event = "model_resolved",
                service = %self.service_name,
                model_name = %descriptor.model_name,
                model_version = %descriptor.version,
                run_id = ?descriptor.run_id,
                origin = %descriptor.origin,
                "Serving trained model"
            );
        }
    }

    /// Log the full normalized record with its prediction for drift analysis
    pub fn log_prediction(
        &self,
        record: &NormalizedRecord,
        result: &PredictionResult,
        descriptor: &ModelDescriptor,
    ) -> serde_json::Result<()> {
        let features = serde_json::to_string(record)?;
        let probabilities = result
            .probabilities
            .map(|p| serde_json::to_string(&p))
            .transpose()?;

        info!(
            event = "prediction_record",
            service = %self.service_name,
            prediction = %result.label,
            confidence = ?result.confidence,
            probabilities = ?probabilities,
            model_name = %descriptor.model_name,
            model_version = %descriptor.version,
            features = %features,
            "Prediction recorded"
        );
        Ok(())
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Credit score service shutting down"
        );
    }
}
