//! Credit tier prediction
//!
//! Normalization of raw input, the model capability trait with its
//! trained (ONNX) and rule-based implementations, and the engine that
//! turns model output into a [`PredictionResult`](crate::models::PredictionResult).

mod engine;
mod fallback;
mod inference;
mod normalizer;

pub use engine::predict;
pub use fallback::{MockModel, MOCK_MODEL_NAME, MOCK_MODEL_VERSION};
pub use inference::OnnxModel;
pub use normalizer::{
    defaults, normalize, CATEGORICAL_FIELDS, CORE_NUMERIC_FIELDS, EXTENDED_NUMERIC_FIELDS,
    MAX_AGE, MAX_UTILIZATION, MIN_AGE,
};

use crate::models::{CreditClass, NormalizedRecord};
use anyhow::Result;

/// Prediction capability shared by trained and fallback models
pub trait CreditModel: Send + Sync {
    /// Class labels in the order of the probability columns
    fn classes(&self) -> &[CreditClass];

    /// Predict the credit tier for a record
    fn predict_label(&self, record: &NormalizedRecord) -> Result<CreditClass>;

    /// Per-class probabilities aligned with [`CreditModel::classes`].
    ///
    /// `None` when the model has no probability interface.
    fn predict_distribution(&self, _record: &NormalizedRecord) -> Option<Result<Vec<f64>>> {
        None
    }

    /// Label and distribution from one evaluation of the model.
    ///
    /// Models that produce both in a single run override this.
    fn predict_full(&self, record: &NormalizedRecord) -> Result<Prediction> {
        let label = self.predict_label(record)?;
        Ok(Prediction {
            label,
            distribution: self.predict_distribution(record),
        })
    }
}

/// Raw output of one model evaluation
#[derive(Debug)]
pub struct Prediction {
    pub label: CreditClass,
    pub distribution: Option<Result<Vec<f64>>>,
}
