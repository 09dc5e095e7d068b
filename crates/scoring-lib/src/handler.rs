//! Request orchestration
//!
//! Extracts the record from a direct or gateway-wrapped event, normalizes
//! it, runs the active model and packages the JSON envelope. Every request
//! ends in exactly one of four outcomes: 200, 400 missing/invalid input,
//! or 500 inference/internal failure.

use crate::error::HandlerError;
use crate::health::HealthRegistry;
use crate::models::{ModelDescriptor, PredictionResult, RawRecord};
use crate::observability::ScoringMetrics;
use crate::predictor::{normalize, predict};
use crate::registry::ModelContext;
use crate::telemetry::{PredictionEvent, TelemetrySink};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Status and JSON body of a handled request
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: Value,
}

impl HandlerResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// API-Gateway proxy response document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON envelope serialized as text
    pub body: String,
}

impl From<HandlerResponse> for GatewayResponse {
    fn from(response: HandlerResponse) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if response.is_success() {
            for (name, value) in CORS_HEADERS {
                headers.insert(name.to_string(), value.to_string());
            }
        }

        Self {
            status_code: response.status,
            headers,
            body: response.body.to_string(),
        }
    }
}

/// Headers added to successful gateway responses
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, GET, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
];

/// Scores requests against the model resolved at startup
#[derive(Clone)]
pub struct RequestHandler {
    context: ModelContext,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    metrics: Option<ScoringMetrics>,
    health: Option<HealthRegistry>,
}

impl RequestHandler {
    pub fn new(context: ModelContext) -> Self {
        Self {
            context,
            sinks: Vec::new(),
            metrics: None,
            health: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Count request outcomes and sink failures
    pub fn with_metrics(mut self, metrics: ScoringMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Report telemetry delivery to the health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.context.descriptor()
    }

    /// Handle a direct or gateway-wrapped event
    pub fn handle(&self, event: &Value) -> HandlerResponse {
        self.handle_at(event, Utc::now())
    }

    /// Handle an event, stamping success envelopes with `now`
    pub fn handle_at(&self, event: &Value, now: DateTime<Utc>) -> HandlerResponse {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(event, now)))
            .unwrap_or_else(|payload| Err(HandlerError::Internal(panic_message(payload.as_ref()))));

        let response = match outcome {
            Ok(body) => HandlerResponse { status: 200, body },
            Err(err) => {
                match &err {
                    HandlerError::MissingData | HandlerError::InvalidData(_) => {
                        debug!(error = %err, "Rejected request")
                    }
                    HandlerError::InferenceFailed(_) | HandlerError::Internal(_) => {
                        error!(error = %err, code = err.code(), "Request failed")
                    }
                }
                HandlerResponse {
                    status: err.status_code(),
                    body: error_envelope(&err),
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.inc_requests(response.status);
        }
        response
    }

    /// Handle an event and reply with an API-Gateway proxy response
    pub fn handle_gateway(&self, event: &Value) -> GatewayResponse {
        self.handle(event).into()
    }

    fn process(&self, event: &Value, now: DateTime<Utc>) -> Result<Value, HandlerError> {
        let data = extract_data(event)?;
        let record = normalize(&data)?;

        let (model, descriptor) = self.context.current();
        let start = Instant::now();
        let result = predict(model, &record)?;
        let latency = start.elapsed();

        self.emit(&PredictionEvent {
            record: &record,
            result: &result,
            descriptor,
            latency,
        });

        Ok(success_envelope(&result, descriptor, now))
    }

    /// Deliver an event to every sink; sink failures never reach the caller
    fn emit(&self, event: &PredictionEvent<'_>) {
        let mut failed = Vec::new();
        for sink in &self.sinks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.record(event)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!(sink = sink.name(), error = %failure, "Telemetry sink failed");
            if let Some(metrics) = &self.metrics {
                metrics.inc_telemetry_errors(sink.name());
            }
            failed.push(sink.name());
        }

        if let Some(health) = &self.health {
            health.telemetry_delivered(&failed);
        }
    }
}

/// Pull the `data` mapping out of a direct or gateway-wrapped event.
///
/// A gateway `body` may be a JSON string or an already-decoded object.
/// An empty mapping is accepted; a missing or non-mapping `data` is not.
pub fn extract_data(event: &Value) -> Result<RawRecord, HandlerError> {
    let payload = match event.get("body") {
        Some(Value::String(text)) => {
            serde_json::from_str::<Value>(text).map_err(|_| HandlerError::MissingData)?
        }
        Some(body @ Value::Object(_)) => body.clone(),
        Some(_) => return Err(HandlerError::MissingData),
        None => event.clone(),
    };

    match payload.get("data") {
        Some(Value::Object(data)) => Ok(data.clone()),
        _ => Err(HandlerError::MissingData),
    }
}

fn success_envelope(
    result: &PredictionResult,
    descriptor: &ModelDescriptor,
    now: DateTime<Utc>,
) -> Value {
    let mut body = json!({
        "prediction": result.label.as_str(),
        "model_version": descriptor.version,
        "model_name": descriptor.model_name,
        "timestamp": now.to_rfc3339_opts(SecondsFormat::Millis, true),
    });

    if let Some(fields) = body.as_object_mut() {
        if let Some(confidence) = result.confidence {
            fields.insert("confidence".to_string(), json!(confidence));
        }
        if let Some(probabilities) = result.probabilities {
            fields.insert("probabilities".to_string(), json!(probabilities));
        }
    }
    body
}

fn error_envelope(err: &HandlerError) -> Value {
    json!({
        "error": err.code(),
        "message": err.public_message(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreditClass, ModelOrigin, NormalizedRecord};
    use crate::predictor::CreditModel;
    use crate::health::{components, ComponentStatus};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FailingModel;

    impl CreditModel for FailingModel {
        fn classes(&self) -> &[CreditClass] {
            &CreditClass::ALL
        }

        fn predict_label(&self, _record: &NormalizedRecord) -> anyhow::Result<CreditClass> {
            anyhow::bail!("input tensor has wrong rank")
        }
    }

    struct PanickingModel;

    impl CreditModel for PanickingModel {
        fn classes(&self) -> &[CreditClass] {
            &CreditClass::ALL
        }

        fn predict_label(&self, _record: &NormalizedRecord) -> anyhow::Result<CreditClass> {
            panic!("model state corrupted")
        }
    }

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
    }

    impl TelemetrySink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn record(&self, _event: &PredictionEvent<'_>) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenSink;

    impl TelemetrySink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        fn record(&self, _event: &PredictionEvent<'_>) -> anyhow::Result<()> {
            anyhow::bail!("collector unreachable")
        }
    }

    #[derive(Default)]
    struct FlakySink {
        failing: AtomicBool,
    }

    impl TelemetrySink for FlakySink {
        fn name(&self) -> &str {
            "flaky"
        }

        fn record(&self, _event: &PredictionEvent<'_>) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("exporter timed out");
            }
            Ok(())
        }
    }

    struct PanickingSink;

    impl TelemetrySink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        fn record(&self, _event: &PredictionEvent<'_>) -> anyhow::Result<()> {
            panic!("sink bug")
        }
    }

    fn mock_handler() -> RequestHandler {
        RequestHandler::new(ModelContext::mock())
    }

    fn handler_with(model: Arc<dyn CreditModel>) -> RequestHandler {
        let descriptor = ModelDescriptor::new("test-model", "1", ModelOrigin::LocalFile);
        RequestHandler::new(ModelContext::new(model, descriptor))
    }

    #[test]
    fn test_success_envelope() {
        let response = mock_handler().handle(&json!({"data": {"Annual_Income": 90000}}));
        assert_eq!(response.status, 200);

        let body = response.body;
        assert_eq!(body["model_name"], "mock_credit_score_model");
        assert_eq!(body["model_version"], "1.0-demo");
        assert!(body["timestamp"].is_string());
        assert!(body["confidence"].is_number());
        assert!(body["probabilities"]["Good"].is_number());
    }

    #[test]
    fn test_missing_data_variants() {
        let handler = mock_handler();
        for event in [
            json!({}),
            json!({"data": null}),
            json!({"data": [1, 2]}),
            json!({"data": "Age=30"}),
            json!({"body": "not json"}),
            json!({"body": "{\"other\": 1}"}),
            json!({"body": 17}),
        ] {
            let response = handler.handle(&event);
            assert_eq!(response.status, 400, "event {}", event);
            assert_eq!(response.body["error"], "missing-data");
        }
    }

    #[test]
    fn test_invalid_core_field() {
        let response = mock_handler().handle(&json!({"data": {"Age": "invalid"}}));
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "invalid-data");
        let message = response.body["message"].as_str().unwrap();
        assert!(message.contains("Age"));
        assert!(message.contains("invalid"));
    }

    #[test]
    fn test_gateway_body_as_object() {
        let response = mock_handler().handle(&json!({"body": {"data": {}}}));
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_inference_failure_is_500() {
        let response = handler_with(Arc::new(FailingModel)).handle(&json!({"data": {}}));
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "inference-failed");
        assert!(!response.body["message"].as_str().unwrap().contains("tensor"));
    }

    #[test]
    fn test_panic_becomes_internal_error() {
        let response = handler_with(Arc::new(PanickingModel)).handle(&json!({"data": {}}));
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], "internal-error");
    }

    #[test]
    fn test_sink_failures_do_not_change_response() {
        let counting = Arc::new(CountingSink::default());
        let event = json!({"data": {"Annual_Income": 28000, "Credit_Utilization_Ratio": 89}});
        let now = Utc::now();

        let plain = mock_handler().handle_at(&event, now);
        let noisy = mock_handler()
            .with_sink(Arc::new(BrokenSink))
            .with_sink(Arc::new(PanickingSink))
            .with_sink(counting.clone())
            .handle_at(&event, now);

        assert_eq!(plain, noisy);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sinks_skipped_on_failure() {
        let counting = Arc::new(CountingSink::default());
        let handler = mock_handler().with_sink(counting.clone());
        handler.handle(&json!({"data": {"Age": "x"}}));
        handler.handle(&json!({}));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sink_failures_degrade_telemetry_health() {
        let health = HealthRegistry::new();
        health.register(components::TELEMETRY).await;
        let flaky = Arc::new(FlakySink::default());
        let handler = mock_handler()
            .with_sink(flaky.clone())
            .with_health(health.clone());

        flaky.failing.store(true, Ordering::SeqCst);
        for _ in 0..5 {
            assert_eq!(handler.handle(&json!({"data": {}})).status, 200);
        }
        let telemetry = health.health().await.components[components::TELEMETRY].clone();
        assert_eq!(telemetry.status, ComponentStatus::Degraded);
        assert!(telemetry.message.unwrap().contains("flaky"));

        flaky.failing.store(false, Ordering::SeqCst);
        handler.handle(&json!({"data": {}}));
        let telemetry = health.health().await.components[components::TELEMETRY].clone();
        assert_eq!(telemetry.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_rejected_requests_leave_telemetry_health_alone() {
        let health = HealthRegistry::new();
        health.set_degraded(components::TELEMETRY, "telemetry sink failing: broken").await;
        let handler = mock_handler()
            .with_sink(Arc::new(CountingSink::default()))
            .with_health(health.clone());

        handler.handle(&json!({"data": {"Age": "x"}}));
        let telemetry = health.health().await.components[components::TELEMETRY].clone();
        assert_eq!(telemetry.status, ComponentStatus::Degraded);
    }

    #[test]
    fn test_gateway_response_headers() {
        let handler = mock_handler();

        let ok = handler.handle_gateway(&json!({"data": {}}));
        assert_eq!(ok.status_code, 200);
        assert_eq!(ok.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(ok.headers["Content-Type"], "application/json");
        let body: Value = serde_json::from_str(&ok.body).unwrap();
        assert!(body["prediction"].is_string());

        let bad = handler.handle_gateway(&json!({}));
        assert_eq!(bad.status_code, 400);
        assert_eq!(bad.headers.len(), 1);

        let doc = serde_json::to_value(&bad).unwrap();
        assert_eq!(doc["statusCode"], 400);
    }

    #[test]
    fn test_timestamp_uses_supplied_clock() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let response = mock_handler().handle_at(&json!({"data": {}}), now);
        assert_eq!(response.body["timestamp"], "2024-03-01T12:00:00.000Z");
    }
}
