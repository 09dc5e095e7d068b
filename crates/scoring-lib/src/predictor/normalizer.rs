//! Input normalization
//!
//! Completes an arbitrary applicant record into the fixed feature schema.
//! Absent fields take documented defaults; core numeric fields that are
//! present but unreadable are rejected; extended numeric fields degrade to 0.

use crate::error::ValidationError;
use crate::models::{NormalizedRecord, RawRecord};
use serde_json::Value;

/// Default values substituted for absent fields
pub mod defaults {
    pub const AGE: f64 = 30.0;
    pub const ANNUAL_INCOME: f64 = 50_000.0;
    pub const MONTHLY_INHAND_SALARY: f64 = 4_000.0;
    pub const NUM_BANK_ACCOUNTS: f64 = 2.0;
    pub const NUM_CREDIT_CARD: f64 = 1.0;
    pub const INTEREST_RATE: f64 = 15.0;
    pub const NUM_OF_LOAN: f64 = 1.0;
    pub const OUTSTANDING_DEBT: f64 = 5_000.0;
    pub const CREDIT_UTILIZATION_RATIO: f64 = 30.0;
    pub const TOTAL_EMI_PER_MONTH: f64 = 500.0;
    pub const AMOUNT_INVESTED_MONTHLY: f64 = 200.0;
    pub const MONTHLY_BALANCE: f64 = 2_000.0;

    pub const EXTENDED: f64 = 0.0;

    pub const MONTH: &str = "January";
    pub const OCCUPATION: &str = "Engineer";
    pub const TYPE_OF_LOAN: &str = "Personal Loan";
    pub const CREDIT_MIX: &str = "Standard";
    pub const CREDIT_HISTORY_AGE: &str = "5 Years";
    pub const PAYMENT_OF_MIN_AMOUNT: &str = "Yes";
    pub const PAYMENT_BEHAVIOUR: &str = "High_spent_Small_value_payments";
}

/// Core numeric fields and their defaults
pub const CORE_NUMERIC_FIELDS: [(&str, f64); 12] = [
    ("Age", defaults::AGE),
    ("Annual_Income", defaults::ANNUAL_INCOME),
    ("Monthly_Inhand_Salary", defaults::MONTHLY_INHAND_SALARY),
    ("Num_Bank_Accounts", defaults::NUM_BANK_ACCOUNTS),
    ("Num_Credit_Card", defaults::NUM_CREDIT_CARD),
    ("Interest_Rate", defaults::INTEREST_RATE),
    ("Num_of_Loan", defaults::NUM_OF_LOAN),
    ("Outstanding_Debt", defaults::OUTSTANDING_DEBT),
    ("Credit_Utilization_Ratio", defaults::CREDIT_UTILIZATION_RATIO),
    ("Total_EMI_per_month", defaults::TOTAL_EMI_PER_MONTH),
    ("Amount_invested_monthly", defaults::AMOUNT_INVESTED_MONTHLY),
    ("Monthly_Balance", defaults::MONTHLY_BALANCE),
];

/// Extended numeric fields, all defaulting to 0
pub const EXTENDED_NUMERIC_FIELDS: [&str; 4] = [
    "Delay_from_due_date",
    "Num_of_Delayed_Payment",
    "Changed_Credit_Limit",
    "Num_Credit_Inquiries",
];

/// Categorical fields and their defaults
pub const CATEGORICAL_FIELDS: [(&str, &str); 7] = [
    ("Month", defaults::MONTH),
    ("Occupation", defaults::OCCUPATION),
    ("Type_of_Loan", defaults::TYPE_OF_LOAN),
    ("Credit_Mix", defaults::CREDIT_MIX),
    ("Credit_History_Age", defaults::CREDIT_HISTORY_AGE),
    ("Payment_of_Min_Amount", defaults::PAYMENT_OF_MIN_AMOUNT),
    ("Payment_Behaviour", defaults::PAYMENT_BEHAVIOUR),
];

pub const MIN_AGE: f64 = 18.0;
pub const MAX_AGE: f64 = 100.0;
pub const MAX_UTILIZATION: f64 = 100.0;

/// Result of reading one raw value as a number
#[derive(Debug, Clone, Copy, PartialEq)]
enum Coerced {
    Absent,
    Number(f64),
    Invalid,
}

fn coerce_number(value: Option<&Value>) -> Coerced {
    match value {
        None | Some(Value::Null) => Coerced::Absent,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => Coerced::Number(v),
            _ => Coerced::Invalid,
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Coerced::Absent;
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Coerced::Number(v),
                _ => Coerced::Invalid,
            }
        }
        Some(Value::Bool(b)) => Coerced::Number(if *b { 1.0 } else { 0.0 }),
        Some(Value::Array(_)) | Some(Value::Object(_)) => Coerced::Invalid,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn core_numeric(raw: &RawRecord, field: &'static str, default: f64) -> Result<f64, ValidationError> {
    match coerce_number(raw.get(field)) {
        Coerced::Absent => Ok(default),
        Coerced::Number(v) => Ok(v),
        Coerced::Invalid => Err(ValidationError {
            field,
            value: raw.get(field).map(render).unwrap_or_default(),
        }),
    }
}

fn extended_numeric(raw: &RawRecord, field: &str) -> f64 {
    match coerce_number(raw.get(field)) {
        Coerced::Number(v) => v,
        Coerced::Absent | Coerced::Invalid => defaults::EXTENDED,
    }
}

fn categorical(raw: &RawRecord, field: &str, default: &str) -> String {
    match raw.get(field) {
        None | Some(Value::Null) => default.to_string(),
        Some(value) => render(value),
    }
}

/// Validate and complete a raw record
pub fn normalize(raw: &RawRecord) -> Result<NormalizedRecord, ValidationError> {
    let mut record = NormalizedRecord::default();

    for (field, default) in CORE_NUMERIC_FIELDS {
        let value = core_numeric(raw, field, default)?;
        set_numeric(&mut record, field, value);
    }
    for field in EXTENDED_NUMERIC_FIELDS {
        set_numeric(&mut record, field, extended_numeric(raw, field));
    }
    for (field, default) in CATEGORICAL_FIELDS {
        if let Some(slot) = record.categorical_mut(field) {
            *slot = categorical(raw, field, default);
        }
    }

    apply_clamps(&mut record);
    Ok(record)
}

fn set_numeric(record: &mut NormalizedRecord, field: &str, value: f64) {
    if let Some(slot) = record.numeric_mut(field) {
        *slot = value;
    }
}

/// Range rules applied after defaulting and parsing
fn apply_clamps(record: &mut NormalizedRecord) {
    record.age = record.age.clamp(MIN_AGE, MAX_AGE);
    record.annual_income = record.annual_income.abs();
    record.credit_utilization_ratio = record.credit_utilization_ratio.clamp(0.0, MAX_UTILIZATION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let record = normalize(&raw(json!({"Age": 42, "Annual_Income": 80000}))).unwrap();
        assert_eq!(record.age, 42.0);
        assert_eq!(record.annual_income, 80000.0);

        for (field, default) in CORE_NUMERIC_FIELDS.iter().skip(2) {
            assert_eq!(record.numeric(field), Some(*default), "default for {}", field);
        }
        for field in EXTENDED_NUMERIC_FIELDS {
            assert_eq!(record.numeric(field), Some(0.0));
        }
        let as_raw = record.to_raw();
        for (field, default) in CATEGORICAL_FIELDS {
            assert_eq!(as_raw[field], json!(default));
        }
        assert_eq!(as_raw.len(), 23);
    }

    #[test]
    fn test_field_tables_cover_the_record() {
        let mut record = NormalizedRecord::default();
        for (field, _) in CORE_NUMERIC_FIELDS {
            assert!(record.numeric_mut(field).is_some(), "{}", field);
        }
        for field in EXTENDED_NUMERIC_FIELDS {
            assert!(record.numeric_mut(field).is_some(), "{}", field);
        }
        for (field, _) in CATEGORICAL_FIELDS {
            assert!(record.categorical_mut(field).is_some(), "{}", field);
        }
        let covered =
            CORE_NUMERIC_FIELDS.len() + EXTENDED_NUMERIC_FIELDS.len() + CATEGORICAL_FIELDS.len();
        assert_eq!(covered, record.to_raw().len());
    }

    #[test]
    fn test_invalid_core_field_rejected() {
        let err = normalize(&raw(json!({"Age": "invalid", "Annual_Income": -1000}))).unwrap_err();
        assert_eq!(err.field, "Age");
        assert_eq!(err.value, "invalid");
    }

    #[test]
    fn test_structured_values_rejected_for_core_fields() {
        let err = normalize(&raw(json!({"Outstanding_Debt": [1, 2]}))).unwrap_err();
        assert_eq!(err.field, "Outstanding_Debt");
        assert_eq!(err.value, "[1,2]");
    }

    #[test]
    fn test_non_finite_strings_rejected() {
        assert!(normalize(&raw(json!({"Monthly_Balance": "NaN"}))).is_err());
        assert!(normalize(&raw(json!({"Monthly_Balance": "inf"}))).is_err());
    }

    #[test]
    fn test_empty_and_null_treated_as_absent() {
        let record = normalize(&raw(json!({"Age": "", "Interest_Rate": null}))).unwrap();
        assert_eq!(record.age, defaults::AGE);
        assert_eq!(record.interest_rate, defaults::INTEREST_RATE);
    }

    #[test]
    fn test_numeric_strings_and_bools_coerced() {
        let record = normalize(&raw(json!({
            "Num_Credit_Card": " 4 ",
            "Interest_Rate": "12.5",
            "Num_of_Loan": true
        })))
        .unwrap();
        assert_eq!(record.num_credit_card, 4.0);
        assert_eq!(record.interest_rate, 12.5);
        assert_eq!(record.num_of_loan, 1.0);
    }

    #[test]
    fn test_extended_fields_tolerate_garbage() {
        let record = normalize(&raw(json!({
            "Delay_from_due_date": "soon",
            "Num_of_Delayed_Payment": "3",
            "Changed_Credit_Limit": {"nested": true},
            "Num_Credit_Inquiries": 7
        })))
        .unwrap();
        assert_eq!(record.delay_from_due_date, 0.0);
        assert_eq!(record.num_of_delayed_payment, 3.0);
        assert_eq!(record.changed_credit_limit, 0.0);
        assert_eq!(record.num_credit_inquiries, 7.0);
    }

    #[test]
    fn test_clamps() {
        let low = normalize(&raw(json!({"Age": 5, "Credit_Utilization_Ratio": -4}))).unwrap();
        assert_eq!(low.age, MIN_AGE);
        assert_eq!(low.credit_utilization_ratio, 0.0);

        let high = normalize(&raw(json!({
            "Age": 130,
            "Annual_Income": -1000,
            "Credit_Utilization_Ratio": 250.0
        })))
        .unwrap();
        assert_eq!(high.age, MAX_AGE);
        assert_eq!(high.annual_income, 1000.0);
        assert_eq!(high.credit_utilization_ratio, MAX_UTILIZATION);
    }

    #[test]
    fn test_categorical_values_kept_verbatim() {
        let record = normalize(&raw(json!({
            "Occupation": "Architect",
            "Month": 3,
            "Credit_Mix": null,
            "Unrelated": "ignored"
        })))
        .unwrap();
        assert_eq!(record.occupation, "Architect");
        assert_eq!(record.month, "3");
        assert_eq!(record.credit_mix, defaults::CREDIT_MIX);
    }

    #[test]
    fn test_renormalization_is_stable() {
        let first = normalize(&raw(json!({
            "Age": 12,
            "Annual_Income": "-25000",
            "Credit_Utilization_Ratio": 140,
            "Payment_Behaviour": "Low_spent_Large_value_payments"
        })))
        .unwrap();
        let second = normalize(&first.to_raw()).unwrap();
        assert_eq!(first, second);
    }
}
