//! Credit score classification library
//!
//! This crate provides the core functionality for:
//! - Normalizing partial applicant records into a fixed feature schema
//! - Resolving a model through the registry / run / local-file / mock chain
//! - Predicting a risk tier with confidence and class probabilities
//! - Request orchestration into JSON response envelopes
//! - Health checks, telemetry and observability

pub mod error;
pub mod handler;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod registry;
pub mod telemetry;

pub use error::{HandlerError, InferenceError, ModelResolutionError, ValidationError};
pub use handler::{GatewayResponse, HandlerResponse, RequestHandler};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ScoringMetrics, StructuredLogger};
pub use registry::{ModelContext, ModelResolver, ResolverConfig};
pub use telemetry::{DriftLogSink, MetricsSink, PredictionEvent, TelemetrySink};
