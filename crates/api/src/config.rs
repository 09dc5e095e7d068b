//! Service configuration

use anyhow::{Context, Result};
use scoring_lib::registry::{
    MlflowConfig, ResolverConfig, DEFAULT_FALLBACK_RUN_IDS, DEFAULT_MODEL_NAME,
    DEFAULT_TRACKING_URI,
};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Unprefixed toggle forcing remote-only model resolution
pub const FORCE_REMOTE_VAR: &str = "FORCE_MLFLOW";

const ENV_PREFIX: &str = "SCORING";

/// Service configuration, read from `SCORING_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name reported in logs and the service summary
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// MLflow tracking server; empty disables the remote tiers
    #[serde(default = "default_tracking_uri")]
    pub tracking_uri: String,

    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default)]
    pub registry_username: Option<String>,

    #[serde(default)]
    pub registry_token: Option<String>,

    /// Runs tried when the registry has no usable version
    #[serde(default = "default_fallback_run_ids", deserialize_with = "comma_list")]
    pub fallback_run_ids: Vec<String>,

    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,

    #[serde(default = "default_metadata_artifact_path")]
    pub metadata_artifact_path: String,

    #[serde(default = "default_local_model_path")]
    pub local_model_path: PathBuf,

    #[serde(default = "default_local_metadata_path")]
    pub local_metadata_path: PathBuf,

    /// Fail startup instead of serving a local or mock model
    #[serde(default)]
    pub force_remote: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_tier_timeout")]
    pub tier_timeout_secs: u64,
}

fn default_service_name() -> String {
    "credit-score-api".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_tracking_uri() -> String {
    DEFAULT_TRACKING_URI.to_string()
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_fallback_run_ids() -> Vec<String> {
    DEFAULT_FALLBACK_RUN_IDS.iter().map(|s| s.to_string()).collect()
}

fn default_artifact_path() -> String {
    "model/model.onnx".to_string()
}

fn default_metadata_artifact_path() -> String {
    "model/model_metadata.json".to_string()
}

fn default_local_model_path() -> PathBuf {
    PathBuf::from("model/model.onnx")
}

fn default_local_metadata_path() -> PathBuf {
    PathBuf::from("model/model_metadata.json")
}

fn default_request_timeout() -> u64 {
    10
}

fn default_tier_timeout() -> u64 {
    60
}

/// Accept either a comma separated string or a list
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Text(String),
    }

    let items = match ListOrString::deserialize(deserializer)? {
        ListOrString::List(items) => items,
        ListOrString::Text(text) => text.split(',').map(str::to_string).collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// `FORCE_MLFLOW` is on only for a case-insensitive "true"
fn flag_enabled(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of environment variables
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let force_remote = vars.get(FORCE_REMOTE_VAR).map(|v| flag_enabled(v));

        let mut builder = config::Config::builder().add_source(
            config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)),
        );
        if let Some(force_remote) = force_remote {
            builder = builder.set_override("force_remote", force_remote)?;
        }

        builder
            .build()?
            .try_deserialize()
            .context("Invalid service configuration")
    }

    pub fn registry_enabled(&self) -> bool {
        !self.tracking_uri.trim().is_empty()
    }

    /// Registry client settings, or `None` when the remote tiers are disabled
    pub fn mlflow_config(&self) -> Option<MlflowConfig> {
        self.registry_enabled().then(|| MlflowConfig {
            tracking_uri: self.tracking_uri.clone(),
            username: self.registry_username.clone(),
            token: self.registry_token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        })
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            model_name: self.model_name.clone(),
            fallback_run_ids: self.fallback_run_ids.clone(),
            artifact_path: self.artifact_path.clone(),
            metadata_artifact_path: self.metadata_artifact_path.clone(),
            local_model_path: self.local_model_path.clone(),
            local_metadata_path: self.local_metadata_path.clone(),
            force_remote: self.force_remote,
            tier_timeout: Duration::from_secs(self.tier_timeout_secs),
        }
    }
}
