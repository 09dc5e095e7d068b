//! Rule-based stand-in used when no trained model is reachable

use super::CreditModel;
use crate::models::{CreditClass, ModelDescriptor, ModelOrigin, NormalizedRecord};
use anyhow::Result;

pub const MOCK_MODEL_NAME: &str = "mock_credit_score_model";
pub const MOCK_MODEL_VERSION: &str = "1.0-demo";

/// Probability columns produced by the mock, in this order
const MOCK_CLASSES: [CreditClass; 3] = [CreditClass::Poor, CreditClass::Standard, CreditClass::Good];

/// Deterministic rule-based classifier.
///
/// Scores income, utilization and outstanding debt, then maps the score
/// to a tier. Its probabilities come from a fixed table keyed by the
/// chosen tier and are not a statistical estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockModel;

impl MockModel {
    pub fn new() -> Self {
        Self
    }

    /// Integer risk score in 0..=5
    pub fn score(record: &NormalizedRecord) -> u8 {
        let mut score = 0;

        if record.annual_income > 60_000.0 {
            score += 2;
        } else if record.annual_income > 35_000.0 {
            score += 1;
        }

        if record.credit_utilization_ratio < 30.0 {
            score += 2;
        } else if record.credit_utilization_ratio < 60.0 {
            score += 1;
        }

        if record.outstanding_debt < 5_000.0 {
            score += 1;
        }

        score
    }

    pub fn classify(score: u8) -> CreditClass {
        match score {
            s if s >= 4 => CreditClass::Good,
            s if s >= 2 => CreditClass::Standard,
            _ => CreditClass::Poor,
        }
    }

    /// Fixed probability row (Poor, Standard, Good) for a predicted tier
    fn probability_row(class: CreditClass) -> [f64; 3] {
        match class {
            CreditClass::Good => [0.05, 0.15, 0.80],
            CreditClass::Standard => [0.20, 0.65, 0.15],
            CreditClass::Poor => [0.75, 0.20, 0.05],
        }
    }

    pub fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new(MOCK_MODEL_NAME, MOCK_MODEL_VERSION, ModelOrigin::Mock)
            .with_description("Rule-based demonstration model; not trained on data")
    }
}

impl CreditModel for MockModel {
    fn classes(&self) -> &[CreditClass] {
        &MOCK_CLASSES
    }

    fn predict_label(&self, record: &NormalizedRecord) -> Result<CreditClass> {
        Ok(Self::classify(Self::score(record)))
    }

    fn predict_distribution(&self, record: &NormalizedRecord) -> Option<Result<Vec<f64>>> {
        let class = Self::classify(Self::score(record));
        Some(Ok(Self::probability_row(class).to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::normalize;
    use serde_json::json;

    fn record(value: serde_json::Value) -> NormalizedRecord {
        normalize(value.as_object().unwrap()).unwrap()
    }

    #[test]
    fn test_high_income_low_utilization_is_good() {
        let r = record(json!({
            "Age": 42,
            "Annual_Income": 120000,
            "Credit_Utilization_Ratio": 18.0,
            "Outstanding_Debt": 15000
        }));
        assert_eq!(MockModel::score(&r), 4);
        assert_eq!(MockModel.predict_label(&r).unwrap(), CreditClass::Good);
    }

    #[test]
    fn test_low_income_high_utilization_is_poor() {
        let r = record(json!({
            "Age": 26,
            "Annual_Income": 28000,
            "Credit_Utilization_Ratio": 89.0,
            "Outstanding_Debt": 22000
        }));
        assert_eq!(MockModel::score(&r), 0);
        assert_eq!(MockModel.predict_label(&r).unwrap(), CreditClass::Poor);
    }

    #[test]
    fn test_defaults_score_standard() {
        // 50k income (+1), 30% utilization (+1), 5000 debt (+0)
        let r = record(json!({}));
        assert_eq!(MockModel::score(&r), 2);
        assert_eq!(MockModel::classify(2), CreditClass::Standard);
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(MockModel::classify(0), CreditClass::Poor);
        assert_eq!(MockModel::classify(1), CreditClass::Poor);
        assert_eq!(MockModel::classify(3), CreditClass::Standard);
        assert_eq!(MockModel::classify(5), CreditClass::Good);
    }

    #[test]
    fn test_distribution_matches_declared_order() {
        let r = record(json!({"Annual_Income": 90000, "Credit_Utilization_Ratio": 10, "Outstanding_Debt": 100}));
        let probs = MockModel.predict_distribution(&r).unwrap().unwrap();
        let good_idx = MockModel
            .classes()
            .iter()
            .position(|c| *c == CreditClass::Good)
            .unwrap();
        assert_eq!(probs[good_idx], 0.80);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_descriptor_is_marked_mock() {
        let descriptor = MockModel::descriptor();
        assert_eq!(descriptor.origin, ModelOrigin::Mock);
        assert_eq!(descriptor.model_name, MOCK_MODEL_NAME);
        assert_eq!(descriptor.version, MOCK_MODEL_VERSION);
    }
}
