//! Sidecar metadata stored next to a model artifact

use crate::models::{CreditClass, NUMERIC_TRAINING_ORDER};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Metadata document describing a serialized model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub downloaded_at: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    /// Class labels in the order of the model's probability columns
    #[serde(default)]
    pub classes: Vec<String>,
    /// Numeric input columns in the order the model expects them
    #[serde(default)]
    pub feature_names: Vec<String>,
    /// Lowercase hex SHA256 of the model artifact
    #[serde(default)]
    pub checksum: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl ModelMetadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse model metadata")
    }

    /// Class ordering declared by the model.
    ///
    /// Fails when no ordering is declared, or a label is unknown or repeated.
    pub fn declared_classes(&self) -> Result<Vec<CreditClass>> {
        if self.classes.is_empty() {
            anyhow::bail!("model metadata does not declare its class labels");
        }

        let mut classes = Vec::with_capacity(self.classes.len());
        for label in &self.classes {
            let class: CreditClass = label
                .parse()
                .with_context(|| format!("Unsupported class label in metadata: {}", label))?;
            if classes.contains(&class) {
                anyhow::bail!("class label {} declared more than once", class);
            }
            classes.push(class);
        }
        Ok(classes)
    }

    /// Input columns, defaulting to the numeric training order
    pub fn feature_columns(&self) -> Result<Vec<String>> {
        if self.feature_names.is_empty() {
            return Ok(NUMERIC_TRAINING_ORDER.iter().map(|s| s.to_string()).collect());
        }

        for name in &self.feature_names {
            if !NUMERIC_TRAINING_ORDER.contains(&name.as_str()) {
                anyhow::bail!("feature {} is not a numeric model input", name);
            }
        }
        Ok(self.feature_names.clone())
    }

    /// Check the artifact against the recorded checksum, if any
    pub fn verify_checksum(&self, artifact: &[u8]) -> Result<()> {
        let Some(expected) = self.checksum.as_deref() else {
            return Ok(());
        };

        let computed = compute_checksum(artifact);
        if !computed.eq_ignore_ascii_case(expected.trim()) {
            anyhow::bail!("Checksum mismatch: expected {}, got {}", expected, computed);
        }
        Ok(())
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
