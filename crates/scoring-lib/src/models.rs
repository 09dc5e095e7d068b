//! Core data models for the credit score service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Raw applicant record as received on the wire.
///
/// Arbitrary keys are accepted; unknown ones are ignored by the normalizer.
pub type RawRecord = Map<String, Value>;

/// Credit risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CreditClass {
    Good,
    Standard,
    Poor,
}

impl CreditClass {
    pub const ALL: [CreditClass; 3] = [CreditClass::Good, CreditClass::Standard, CreditClass::Poor];

    pub fn as_str(&self) -> &'static str {
        match self {
            CreditClass::Good => "Good",
            CreditClass::Standard => "Standard",
            CreditClass::Poor => "Poor",
        }
    }
}

impl fmt::Display for CreditClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "good" => Ok(CreditClass::Good),
            "standard" => Ok(CreditClass::Standard),
            "poor" => Ok(CreditClass::Poor),
            other => Err(anyhow::anyhow!("unknown credit class '{}'", other)),
        }
    }
}

/// Fully populated feature record produced by the normalizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    // Core numeric fields
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Annual_Income")]
    pub annual_income: f64,
    #[serde(rename = "Monthly_Inhand_Salary")]
    pub monthly_inhand_salary: f64,
    #[serde(rename = "Num_Bank_Accounts")]
    pub num_bank_accounts: f64,
    #[serde(rename = "Num_Credit_Card")]
    pub num_credit_card: f64,
    #[serde(rename = "Interest_Rate")]
    pub interest_rate: f64,
    #[serde(rename = "Num_of_Loan")]
    pub num_of_loan: f64,
    #[serde(rename = "Outstanding_Debt")]
    pub outstanding_debt: f64,
    #[serde(rename = "Credit_Utilization_Ratio")]
    pub credit_utilization_ratio: f64,
    #[serde(rename = "Total_EMI_per_month")]
    pub total_emi_per_month: f64,
    #[serde(rename = "Amount_invested_monthly")]
    pub amount_invested_monthly: f64,
    #[serde(rename = "Monthly_Balance")]
    pub monthly_balance: f64,

    // Extended numeric fields
    #[serde(rename = "Delay_from_due_date")]
    pub delay_from_due_date: f64,
    #[serde(rename = "Num_of_Delayed_Payment")]
    pub num_of_delayed_payment: f64,
    #[serde(rename = "Changed_Credit_Limit")]
    pub changed_credit_limit: f64,
    #[serde(rename = "Num_Credit_Inquiries")]
    pub num_credit_inquiries: f64,

    // Categorical fields
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "Occupation")]
    pub occupation: String,
    #[serde(rename = "Type_of_Loan")]
    pub type_of_loan: String,
    #[serde(rename = "Credit_Mix")]
    pub credit_mix: String,
    #[serde(rename = "Credit_History_Age")]
    pub credit_history_age: String,
    #[serde(rename = "Payment_of_Min_Amount")]
    pub payment_of_min_amount: String,
    #[serde(rename = "Payment_Behaviour")]
    pub payment_behaviour: String,
}

/// Numeric columns in the order the trained models were fitted on
pub const NUMERIC_TRAINING_ORDER: [&str; 16] = [
    "Age",
    "Annual_Income",
    "Monthly_Inhand_Salary",
    "Num_Bank_Accounts",
    "Num_Credit_Card",
    "Interest_Rate",
    "Num_of_Loan",
    "Delay_from_due_date",
    "Num_of_Delayed_Payment",
    "Changed_Credit_Limit",
    "Num_Credit_Inquiries",
    "Outstanding_Debt",
    "Credit_Utilization_Ratio",
    "Total_EMI_per_month",
    "Amount_invested_monthly",
    "Monthly_Balance",
];

impl NormalizedRecord {
    /// Look up a numeric feature by its wire name
    pub fn numeric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "Age" => self.age,
            "Annual_Income" => self.annual_income,
            "Monthly_Inhand_Salary" => self.monthly_inhand_salary,
            "Num_Bank_Accounts" => self.num_bank_accounts,
            "Num_Credit_Card" => self.num_credit_card,
            "Interest_Rate" => self.interest_rate,
            "Num_of_Loan" => self.num_of_loan,
            "Outstanding_Debt" => self.outstanding_debt,
            "Credit_Utilization_Ratio" => self.credit_utilization_ratio,
            "Total_EMI_per_month" => self.total_emi_per_month,
            "Amount_invested_monthly" => self.amount_invested_monthly,
            "Monthly_Balance" => self.monthly_balance,
            "Delay_from_due_date" => self.delay_from_due_date,
            "Num_of_Delayed_Payment" => self.num_of_delayed_payment,
            "Changed_Credit_Limit" => self.changed_credit_limit,
            "Num_Credit_Inquiries" => self.num_credit_inquiries,
            _ => return None,
        };
        Some(value)
    }

    /// Mutable numeric slot for a wire name
    pub fn numeric_mut(&mut self, name: &str) -> Option<&mut f64> {
        let slot = match name {
            "Age" => &mut self.age,
            "Annual_Income" => &mut self.annual_income,
            "Monthly_Inhand_Salary" => &mut self.monthly_inhand_salary,
            "Num_Bank_Accounts" => &mut self.num_bank_accounts,
            "Num_Credit_Card" => &mut self.num_credit_card,
            "Interest_Rate" => &mut self.interest_rate,
            "Num_of_Loan" => &mut self.num_of_loan,
            "Outstanding_Debt" => &mut self.outstanding_debt,
            "Credit_Utilization_Ratio" => &mut self.credit_utilization_ratio,
            "Total_EMI_per_month" => &mut self.total_emi_per_month,
            "Amount_invested_monthly" => &mut self.amount_invested_monthly,
            "Monthly_Balance" => &mut self.monthly_balance,
            "Delay_from_due_date" => &mut self.delay_from_due_date,
            "Num_of_Delayed_Payment" => &mut self.num_of_delayed_payment,
            "Changed_Credit_Limit" => &mut self.changed_credit_limit,
            "Num_Credit_Inquiries" => &mut self.num_credit_inquiries,
            _ => return None,
        };
        Some(slot)
    }

    /// Mutable categorical slot for a wire name
    pub fn categorical_mut(&mut self, name: &str) -> Option<&mut String> {
        let slot = match name {
            "Month" => &mut self.month,
            "Occupation" => &mut self.occupation,
            "Type_of_Loan" => &mut self.type_of_loan,
            "Credit_Mix" => &mut self.credit_mix,
            "Credit_History_Age" => &mut self.credit_history_age,
            "Payment_of_Min_Amount" => &mut self.payment_of_min_amount,
            "Payment_Behaviour" => &mut self.payment_behaviour,
            _ => return None,
        };
        Some(slot)
    }

    /// Convert back into a raw record (used for re-normalization and drift records)
    pub fn to_raw(&self) -> RawRecord {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => RawRecord::new(),
        }
    }
}

/// Probability assigned to each credit class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassProbabilities {
    #[serde(rename = "Good")]
    pub good: f64,
    #[serde(rename = "Standard")]
    pub standard: f64,
    #[serde(rename = "Poor")]
    pub poor: f64,
}

impl ClassProbabilities {
    pub fn get(&self, class: CreditClass) -> f64 {
        match class {
            CreditClass::Good => self.good,
            CreditClass::Standard => self.standard,
            CreditClass::Poor => self.poor,
        }
    }

    pub fn set(&mut self, class: CreditClass, value: f64) {
        match class {
            CreditClass::Good => self.good = value,
            CreditClass::Standard => self.standard = value,
            CreditClass::Poor => self.poor = value,
        }
    }
}

/// Outcome of running the active model against one record
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub label: CreditClass,
    pub confidence: Option<f64>,
    pub probabilities: Option<ClassProbabilities>,
}

/// Fallback tier that produced the active model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelOrigin {
    Registry,
    Run,
    LocalFile,
    Mock,
}

impl ModelOrigin {
    /// Tiers attempted, in order. Remote-only mode drops the local tiers.
    pub fn resolution_order(force_remote: bool) -> &'static [ModelOrigin] {
        if force_remote {
            &[ModelOrigin::Registry, ModelOrigin::Run]
        } else {
            &[
                ModelOrigin::Registry,
                ModelOrigin::Run,
                ModelOrigin::LocalFile,
                ModelOrigin::Mock,
            ]
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelOrigin::Registry => "registry",
            ModelOrigin::Run => "run",
            ModelOrigin::LocalFile => "local-file",
            ModelOrigin::Mock => "mock",
        }
    }
}

impl fmt::Display for ModelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the resolved model, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub model_name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(rename = "source")]
    pub origin: ModelOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    pub loaded_at: String,
}

impl ModelDescriptor {
    pub fn new(model_name: impl Into<String>, version: impl Into<String>, origin: ModelOrigin) -> Self {
        Self {
            model_name: model_name.into(),
            version: version.into(),
            run_id: None,
            origin,
            description: None,
            metrics: BTreeMap::new(),
            loaded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metrics(mut self, metrics: BTreeMap<String, Value>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_class_parsing() {
        assert_eq!("Good".parse::<CreditClass>().unwrap(), CreditClass::Good);
        assert_eq!(" standard ".parse::<CreditClass>().unwrap(), CreditClass::Standard);
        assert_eq!("POOR".parse::<CreditClass>().unwrap(), CreditClass::Poor);
        assert!("Excellent".parse::<CreditClass>().is_err());
    }

    #[test]
    fn test_origin_serializes_kebab_case() {
        let json = serde_json::to_string(&ModelOrigin::LocalFile).unwrap();
        assert_eq!(json, "\"local-file\"");
        assert_eq!(ModelOrigin::LocalFile.to_string(), "local-file");
    }

    #[test]
    fn test_resolution_order() {
        assert_eq!(ModelOrigin::resolution_order(false).len(), 4);
        assert_eq!(
            ModelOrigin::resolution_order(true),
            &[ModelOrigin::Registry, ModelOrigin::Run]
        );
    }

    #[test]
    fn test_probabilities_serialize_with_class_names() {
        let mut probs = ClassProbabilities::default();
        probs.set(CreditClass::Good, 0.8);
        let json = serde_json::to_value(probs).unwrap();
        assert_eq!(json["Good"], 0.8);
        assert_eq!(json["Poor"], 0.0);
        assert_eq!(probs.get(CreditClass::Good), 0.8);
    }
}
