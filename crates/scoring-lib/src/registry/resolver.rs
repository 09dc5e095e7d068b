//! Startup model resolution
//!
//! Walks the fallback tiers in order (registry, known runs, local file,
//! mock) and returns the first model that loads. Remote-only mode stops
//! after the remote tiers and turns their failure into a fatal error.

use super::{select_latest, ModelMetadata, ModelRegistry};
use crate::error::ModelResolutionError;
use crate::models::{ModelDescriptor, ModelOrigin};
use crate::predictor::{CreditModel, MockModel, OnnxModel};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MODEL_NAME: &str = "fiap-mlops-score-model";

/// Runs known to hold a usable model when the registry has none
pub const DEFAULT_FALLBACK_RUN_IDS: [&str; 2] = [
    "2f5087600685403383420bf1c6720ed5",
    "bcadaadae75c4ea499bcdad78e9a1d11",
];

/// Version reported for models loaded straight from a run
const RUN_VERSION: &str = "from_run";
const LOCAL_MODEL_NAME: &str = "local_model";
const UNKNOWN_VERSION: &str = "unknown";

/// Configuration for model resolution
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Registered model name to search for
    pub model_name: String,
    /// Runs tried in order when the registry yields nothing
    pub fallback_run_ids: Vec<String>,
    /// Model artifact path inside a run
    pub artifact_path: String,
    /// Metadata artifact path inside a run
    pub metadata_artifact_path: String,
    pub local_model_path: PathBuf,
    pub local_metadata_path: PathBuf,
    /// Disable the local-file and mock tiers
    pub force_remote: bool,
    /// Upper bound for a single tier attempt
    pub tier_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            fallback_run_ids: DEFAULT_FALLBACK_RUN_IDS.iter().map(|s| s.to_string()).collect(),
            artifact_path: "model/model.onnx".to_string(),
            metadata_artifact_path: "model/model_metadata.json".to_string(),
            local_model_path: PathBuf::from("model/model.onnx"),
            local_metadata_path: PathBuf::from("model/model_metadata.json"),
            force_remote: false,
            tier_timeout: Duration::from_secs(60),
        }
    }
}

/// Turns artifact bytes plus metadata into a prediction capability
pub type ModelDecoder =
    Arc<dyn Fn(&[u8], &ModelMetadata) -> Result<Arc<dyn CreditModel>> + Send + Sync>;

/// Decoder for ONNX artifacts
pub fn default_decoder() -> ModelDecoder {
    Arc::new(|bytes: &[u8], metadata: &ModelMetadata| -> Result<Arc<dyn CreditModel>> {
        let model: Arc<dyn CreditModel> = Arc::new(OnnxModel::from_bytes(bytes, metadata)?);
        Ok(model)
    })
}

/// The resolved model and its identity, shared read-only by all requests
#[derive(Clone)]
pub struct ModelContext {
    model: Arc<dyn CreditModel>,
    descriptor: ModelDescriptor,
}

impl std::fmt::Debug for ModelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelContext")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl ModelContext {
    pub fn new(model: Arc<dyn CreditModel>, descriptor: ModelDescriptor) -> Self {
        Self { model, descriptor }
    }

    /// Context serving the rule-based fallback
    pub fn mock() -> Self {
        Self::new(Arc::new(MockModel::new()), MockModel::descriptor())
    }

    pub fn current(&self) -> (&dyn CreditModel, &ModelDescriptor) {
        (self.model.as_ref(), &self.descriptor)
    }

    pub fn model(&self) -> &dyn CreditModel {
        self.model.as_ref()
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

/// Resolves the process-wide model through the fallback chain
pub struct ModelResolver {
    config: ResolverConfig,
    registry: Option<Arc<dyn ModelRegistry>>,
    decoder: ModelDecoder,
}

impl ModelResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            registry: None,
            decoder: default_decoder(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_decoder(mut self, decoder: ModelDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the model, trying each tier until one succeeds
    pub async fn resolve(&self) -> Result<ModelContext, ModelResolutionError> {
        let tiers = ModelOrigin::resolution_order(self.config.force_remote);
        if self.config.force_remote {
            info!("Remote-only model resolution enabled; local and mock fallbacks disabled");
        }

        for tier in tiers {
            debug!(tier = %tier, "Attempting model tier");
            match tokio::time::timeout(self.config.tier_timeout, self.attempt(*tier)).await {
                Ok(Ok(context)) => {
                    let descriptor = context.descriptor();
                    info!(
                        origin = %descriptor.origin,
                        model_name = %descriptor.model_name,
                        version = %descriptor.version,
                        run_id = ?descriptor.run_id,
                        "Model resolved"
                    );
                    return Ok(context);
                }
                Ok(Err(e)) => {
                    warn!(tier = %tier, error = %format!("{:#}", e), "Model tier failed");
                }
                Err(_) => {
                    warn!(
                        tier = %tier,
                        timeout_secs = self.config.tier_timeout.as_secs_f64(),
                        "Model tier timed out"
                    );
                }
            }
        }

        let attempted = tiers
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        error!(attempted = %attempted, "No model could be resolved");
        Err(ModelResolutionError::RemoteUnavailable {
            model_name: self.config.model_name.clone(),
            attempted,
        })
    }

    async fn attempt(&self, tier: ModelOrigin) -> Result<ModelContext> {
        match tier {
            ModelOrigin::Registry => self.from_registry().await,
            ModelOrigin::Run => self.from_known_runs().await,
            ModelOrigin::LocalFile => self.from_local_file().await,
            ModelOrigin::Mock => {
                warn!("Using rule-based mock model; predictions are not from a trained model");
                Ok(ModelContext::mock())
            }
        }
    }

    fn registry(&self) -> Result<&dyn ModelRegistry> {
        self.registry
            .as_deref()
            .context("no model registry configured")
    }

    async fn from_registry(&self) -> Result<ModelContext> {
        let registry = self.registry()?;
        let name = &self.config.model_name;

        let versions = registry
            .search_versions(name)
            .await
            .context("Model version search failed")?;
        let latest = select_latest(&versions)
            .with_context(|| format!("no registered versions of {}", name))?;
        let run_id = latest
            .run_id
            .as_deref()
            .with_context(|| format!("version {} of {} has no run id", latest.version, name))?;

        let (model, metadata) = self.load_run(registry, run_id).await?;
        let metrics = self.collect_metrics(registry, run_id, metadata.metrics).await;

        let descriptor = ModelDescriptor::new(name.clone(), latest.version.clone(), ModelOrigin::Registry)
            .with_run_id(run_id)
            .with_metrics(metrics);
        Ok(ModelContext::new(model, descriptor))
    }

    async fn from_known_runs(&self) -> Result<ModelContext> {
        let registry = self.registry()?;

        for run_id in &self.config.fallback_run_ids {
            match self.load_run(registry, run_id).await {
                Ok((model, metadata)) => {
                    let metrics = self.collect_metrics(registry, run_id, metadata.metrics).await;
                    let descriptor =
                        ModelDescriptor::new(self.config.model_name.clone(), RUN_VERSION, ModelOrigin::Run)
                            .with_run_id(run_id.clone())
                            .with_metrics(metrics);
                    return Ok(ModelContext::new(model, descriptor));
                }
                Err(e) => {
                    warn!(run_id = %run_id, error = %format!("{:#}", e), "Failed to load model from run");
                }
            }
        }

        anyhow::bail!(
            "none of the {} known runs produced a model",
            self.config.fallback_run_ids.len()
        )
    }

    /// Download and decode the model logged by a run
    async fn load_run(
        &self,
        registry: &dyn ModelRegistry,
        run_id: &str,
    ) -> Result<(Arc<dyn CreditModel>, ModelMetadata)> {
        let metadata_bytes = registry
            .fetch_artifact(run_id, &self.config.metadata_artifact_path)
            .await?;
        let metadata = ModelMetadata::from_slice(&metadata_bytes)?;

        let model_bytes = registry
            .fetch_artifact(run_id, &self.config.artifact_path)
            .await?;
        metadata.verify_checksum(&model_bytes)?;

        let model = (self.decoder)(&model_bytes, &metadata)
            .with_context(|| format!("Failed to load model of run {}", run_id))?;
        Ok((model, metadata))
    }

    /// Merge registry run metrics over those recorded in metadata
    async fn collect_metrics(
        &self,
        registry: &dyn ModelRegistry,
        run_id: &str,
        mut metrics: BTreeMap<String, Value>,
    ) -> BTreeMap<String, Value> {
        match registry.run_metrics(run_id).await {
            Ok(run_metrics) => metrics.extend(run_metrics),
            Err(e) => debug!(run_id = %run_id, error = %e, "Run metrics unavailable"),
        }
        metrics
    }

    async fn from_local_file(&self) -> Result<ModelContext> {
        let model_path = &self.config.local_model_path;
        let model_bytes = tokio::fs::read(model_path)
            .await
            .with_context(|| format!("Failed to read local model {:?}", model_path))?;

        let metadata_path = &self.config.local_metadata_path;
        let metadata = match tokio::fs::read(metadata_path).await {
            Ok(bytes) => ModelMetadata::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %metadata_path.display(), "No local model metadata");
                ModelMetadata::default()
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read local model metadata {:?}", metadata_path)
                })
            }
        };
        metadata.verify_checksum(&model_bytes)?;

        let model = (self.decoder)(&model_bytes, &metadata)
            .with_context(|| format!("Failed to load local model {:?}", model_path))?;

        let mut descriptor = ModelDescriptor::new(
            metadata.model_name.clone().unwrap_or_else(|| LOCAL_MODEL_NAME.to_string()),
            metadata.version.clone().unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            ModelOrigin::LocalFile,
        )
        .with_metrics(metadata.metrics.clone());
        descriptor.run_id = metadata.run_id.clone();

        Ok(ModelContext::new(model, descriptor))
    }
}
