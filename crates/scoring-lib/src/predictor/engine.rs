//! Prediction engine
//!
//! Runs a model against a normalized record and derives confidence and the
//! per-class distribution from the model's own class ordering.

use super::inference::argmax;
use super::{CreditModel, Prediction};
use crate::error::InferenceError;
use crate::models::{ClassProbabilities, NormalizedRecord, PredictionResult};
use tracing::warn;

/// Predict the credit tier for a record.
///
/// A failing label prediction is an [`InferenceError`]. A missing or failing
/// probability interface only drops confidence and probabilities.
pub fn predict(
    model: &dyn CreditModel,
    record: &NormalizedRecord,
) -> Result<PredictionResult, InferenceError> {
    let Prediction {
        label,
        distribution,
    } = model
        .predict_full(record)
        .map_err(|e| InferenceError::from_anyhow(&e))?;

    let (confidence, probabilities) = match distribution {
        None => (None, None),
        Some(Err(e)) => {
            warn!(error = %e, "Probability prediction failed, omitting distribution");
            (None, None)
        }
        Some(Ok(row)) => class_distribution(model, &row),
    };

    Ok(PredictionResult {
        label,
        confidence,
        probabilities,
    })
}

fn class_distribution(
    model: &dyn CreditModel,
    row: &[f64],
) -> (Option<f64>, Option<ClassProbabilities>) {
    let classes = model.classes();
    if classes.is_empty() || classes.len() != row.len() {
        warn!(
            declared = classes.len(),
            received = row.len(),
            "Model class declaration does not match its probability row, omitting distribution"
        );
        return (None, None);
    }

    let Some(best) = argmax(row) else {
        return (None, None);
    };
    let confidence = row[best].clamp(0.0, 1.0);

    let mut probabilities = ClassProbabilities::default();
    for (class, p) in classes.iter().zip(row) {
        probabilities.set(*class, *p);
    }

    (Some(confidence), Some(probabilities))
}
