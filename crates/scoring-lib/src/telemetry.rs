//! Best-effort prediction telemetry
//!
//! Sinks receive each successful prediction after the response has been
//! decided. A failing sink is logged by the caller and never changes the
//! response.

use crate::models::{ModelDescriptor, NormalizedRecord, PredictionResult};
use crate::observability::{ScoringMetrics, StructuredLogger};
use anyhow::{Context, Result};
use std::time::Duration;

/// One served prediction
#[derive(Debug, Clone, Copy)]
pub struct PredictionEvent<'a> {
    pub record: &'a NormalizedRecord,
    pub result: &'a PredictionResult,
    pub descriptor: &'a ModelDescriptor,
    pub latency: Duration,
}

/// Receiver of prediction telemetry
pub trait TelemetrySink: Send + Sync {
    /// Short label used in logs and the error counter
    fn name(&self) -> &str;

    fn record(&self, event: &PredictionEvent<'_>) -> Result<()>;
}

/// Exports classifications, confidence, latency and key features to Prometheus
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    metrics: ScoringMetrics,
}

impl MetricsSink {
    pub fn new(metrics: ScoringMetrics) -> Self {
        Self { metrics }
    }
}

impl TelemetrySink for MetricsSink {
    fn name(&self) -> &str {
        "metrics"
    }

    fn record(&self, event: &PredictionEvent<'_>) -> Result<()> {
        self.metrics
            .record_prediction(event.result, &event.descriptor.version);
        self.metrics
            .observe_inference_latency(event.latency.as_secs_f64());
        self.metrics.set_feature_values(event.record);
        Ok(())
    }
}

/// Writes the full record and prediction as a `prediction_record` log event
#[derive(Debug, Clone)]
pub struct DriftLogSink {
    logger: StructuredLogger,
}

impl DriftLogSink {
    pub fn new(logger: StructuredLogger) -> Self {
        Self { logger }
    }
}

impl TelemetrySink for DriftLogSink {
    fn name(&self) -> &str {
        "drift-log"
    }

    fn record(&self, event: &PredictionEvent<'_>) -> Result<()> {
        self.logger
            .log_prediction(event.record, event.result, event.descriptor)
            .context("Failed to serialize drift record")
    }
}
