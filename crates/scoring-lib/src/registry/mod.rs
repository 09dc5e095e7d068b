//! Model resolution
//!
//! This module provides:
//! - The remote model registry abstraction and its MLflow REST client
//! - Sidecar metadata parsing and checksum validation
//! - The startup fallback chain (registry, known runs, local file, mock)

mod metadata;
mod mlflow;
mod resolver;

pub use metadata::{compute_checksum, ModelMetadata};
pub use mlflow::{MlflowClient, MlflowConfig, DEFAULT_TRACKING_URI};
pub use resolver::{
    default_decoder, ModelContext, ModelDecoder, ModelResolver, ResolverConfig,
    DEFAULT_FALLBACK_RUN_IDS, DEFAULT_MODEL_NAME,
};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One registered version of a named model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "current_stage")]
    pub stage: Option<String>,
}

/// Remote store of trained models
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// All registered versions of a model
    async fn search_versions(&self, model_name: &str) -> Result<Vec<RegisteredVersion>>;

    /// Raw bytes of an artifact logged by a run
    async fn fetch_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>>;

    /// Metrics logged by a run
    async fn run_metrics(&self, run_id: &str) -> Result<BTreeMap<String, Value>>;
}

/// Pick the numerically highest version.
///
/// Versions that are not integers are ignored. Among equal versions the one
/// listed first by the registry wins.
pub fn select_latest(versions: &[RegisteredVersion]) -> Option<&RegisteredVersion> {
    let mut latest: Option<(u64, &RegisteredVersion)> = None;

    for version in versions {
        let Ok(number) = version.version.trim().parse::<u64>() else {
            tracing::debug!(version = %version.version, "Ignoring non-numeric model version");
            continue;
        };
        match latest {
            Some((best, _)) if best >= number => {}
            _ => latest = Some((number, version)),
        }
    }

    latest.map(|(_, v)| v)
}
