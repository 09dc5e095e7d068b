//! ONNX classifier inference using tract
//!
//! Trained models are exported to ONNX (sklearn via skl2onnx with
//! `zipmap=False`) and run with tract-onnx. The model consumes one f32 row
//! of numeric features; outputs are matched by datum type rather than by
//! name so different exporters work unchanged.

use super::{CreditModel, Prediction};
use crate::models::{CreditClass, NormalizedRecord};
use crate::registry::ModelMetadata;
use anyhow::{Context, Result};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Trained classifier loaded from an ONNX artifact
pub struct OnnxModel {
    model: TractModel,
    classes: Vec<CreditClass>,
    feature_names: Vec<String>,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("classes", &self.classes)
            .field("feature_names", &self.feature_names)
            .finish_non_exhaustive()
    }
}

impl OnnxModel {
    /// Load a model from its ONNX bytes and sidecar metadata
    pub fn from_bytes(model_bytes: &[u8], metadata: &ModelMetadata) -> Result<Self> {
        let classes = metadata.declared_classes()?;
        let feature_names = metadata.feature_columns()?;
        let model = Self::load_model(model_bytes, feature_names.len())?;

        debug!(
            classes = ?classes,
            features = feature_names.len(),
            "ONNX model loaded"
        );

        Ok(Self {
            model,
            classes,
            feature_names,
        })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8], num_features: usize) -> Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, num_features]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    /// Convert a record to the model's input row
    fn record_to_tensor(&self, record: &NormalizedRecord) -> Result<Tensor> {
        let data = self
            .feature_names
            .iter()
            .map(|name| {
                record
                    .numeric(name)
                    .map(|v| v as f32)
                    .with_context(|| format!("Unknown model input feature {}", name))
            })
            .collect::<Result<Vec<f32>>>()?;

        let array = tract_ndarray::Array2::from_shape_vec((1, data.len()), data)
            .context("Failed to shape model input")?;
        Ok(array.into())
    }

    fn run(&self, record: &NormalizedRecord) -> Result<ModelOutputs> {
        let start = Instant::now();
        let input = self.record_to_tensor(record)?;

        let result = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX model execution failed")?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        decode_outputs(result.iter().map(|value| &**value), self.classes.len())
    }
}

impl CreditModel for OnnxModel {
    fn classes(&self) -> &[CreditClass] {
        &self.classes
    }

    fn predict_label(&self, record: &NormalizedRecord) -> Result<CreditClass> {
        let outputs = self.run(record)?;
        label_from_outputs(&self.classes, &outputs)
    }

    fn predict_distribution(&self, record: &NormalizedRecord) -> Option<Result<Vec<f64>>> {
        match self.run(record) {
            Ok(outputs) => outputs.probabilities.map(Ok),
            Err(e) => Some(Err(e)),
        }
    }

    fn predict_full(&self, record: &NormalizedRecord) -> Result<Prediction> {
        let outputs = self.run(record)?;
        let label = label_from_outputs(&self.classes, &outputs)?;
        Ok(Prediction {
            label,
            distribution: outputs.probabilities.map(Ok),
        })
    }
}

/// Predicted label as emitted by the model
#[derive(Debug, Clone, PartialEq)]
enum RawLabel {
    Index(i64),
    Name(String),
}

/// Outputs recognised in a model run
#[derive(Debug, Clone, Default, PartialEq)]
struct ModelOutputs {
    label: Option<RawLabel>,
    probabilities: Option<Vec<f64>>,
}

/// Pick the label and probability tensors out of a run's outputs
fn decode_outputs<'a>(
    outputs: impl IntoIterator<Item = &'a Tensor>,
    num_classes: usize,
) -> Result<ModelOutputs> {
    let mut decoded = ModelOutputs::default();

    for tensor in outputs {
        match tensor.datum_type() {
            DatumType::I64 if decoded.label.is_none() => {
                decoded.label = tensor.as_slice::<i64>()?.first().copied().map(RawLabel::Index);
            }
            DatumType::String if decoded.label.is_none() => {
                decoded.label = tensor.as_slice::<String>()?.first().cloned().map(RawLabel::Name);
            }
            DatumType::F32 if decoded.probabilities.is_none() && tensor.len() == num_classes => {
                decoded.probabilities =
                    Some(tensor.as_slice::<f32>()?.iter().map(|p| *p as f64).collect());
            }
            _ => {}
        }
    }

    Ok(decoded)
}

fn label_from_outputs(classes: &[CreditClass], outputs: &ModelOutputs) -> Result<CreditClass> {
    match &outputs.label {
        Some(RawLabel::Index(idx)) => usize::try_from(*idx)
            .ok()
            .and_then(|i| classes.get(i))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("label index {} outside declared classes", idx)),
        Some(RawLabel::Name(name)) => name.parse(),
        None => {
            let probabilities = outputs
                .probabilities
                .as_deref()
                .context("model produced neither a label nor probabilities")?;
            argmax(probabilities)
                .and_then(|i| classes.get(i))
                .copied()
                .context("model produced an empty probability row")
        }
    }
}

/// Index of the largest value, ignoring NaN
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}
