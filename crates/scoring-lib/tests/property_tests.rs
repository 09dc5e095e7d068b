/// Property-based tests for normalization and the mock classifier
use proptest::prelude::*;
use scoring_lib::predictor::{normalize, MockModel, MAX_AGE, MAX_UTILIZATION, MIN_AGE};
use scoring_lib::RawRecord;
use serde_json::{json, Value};

fn record(value: Value) -> RawRecord {
    value.as_object().cloned().unwrap_or_default()
}

/// A numeric field value as a client might send it
fn wire_number() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-1.0e7..1.0e7f64).prop_map(|v| json!(v)),
        (-500i64..500).prop_map(|v| json!(v)),
        (-1.0e5..1.0e5f64).prop_map(|v| json!(format!("{}", v))),
        Just(Value::Null),
        Just(json!("")),
    ]
}

proptest! {
    #[test]
    fn clamp_laws_hold(age in wire_number(), income in wire_number(), util in wire_number()) {
        let raw = record(json!({
            "Age": age,
            "Annual_Income": income,
            "Credit_Utilization_Ratio": util,
        }));
        let normalized = normalize(&raw).unwrap();

        prop_assert!(normalized.age >= MIN_AGE && normalized.age <= MAX_AGE);
        prop_assert!(normalized.annual_income >= 0.0);
        prop_assert!(
            normalized.credit_utilization_ratio >= 0.0
                && normalized.credit_utilization_ratio <= MAX_UTILIZATION
        );
    }

    #[test]
    fn normalize_is_idempotent(
        age in wire_number(),
        income in wire_number(),
        debt in wire_number(),
        inquiries in wire_number(),
        occupation in "[A-Za-z_ ]{0,12}",
    ) {
        let raw = record(json!({
            "Age": age,
            "Annual_Income": income,
            "Outstanding_Debt": debt,
            "Num_Credit_Inquiries": inquiries,
            "Occupation": occupation,
        }));
        let once = normalize(&raw).unwrap();
        let twice = normalize(&once.to_raw()).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn age_and_income_only_records_are_complete(age in 0.0..150.0f64, income in 0.0..1.0e6f64) {
        let raw = record(json!({"Age": age, "Annual_Income": income}));
        let normalized = normalize(&raw).unwrap();
        let fields = normalized.to_raw();

        prop_assert_eq!(fields.len(), 23);
        prop_assert_eq!(normalized.monthly_inhand_salary, 4000.0);
        prop_assert_eq!(normalized.monthly_balance, 2000.0);
        prop_assert_eq!(normalized.num_credit_inquiries, 0.0);
        prop_assert_eq!(normalized.payment_behaviour.as_str(), "High_spent_Small_value_payments");
    }

    #[test]
    fn non_numeric_core_field_is_rejected(word in "[a-zA-Z]{3,10}") {
        // Words that happen to parse as floats are not invalid input
        prop_assume!(word.parse::<f64>().is_err());
        let raw = record(json!({"Monthly_Balance": word}));
        let err = normalize(&raw).unwrap_err();
        prop_assert_eq!(err.field, "Monthly_Balance");
    }

    #[test]
    fn mock_score_monotonic_in_income(
        low in 0.0..=35_000.0f64,
        high in 60_000.01..1.0e7f64,
        util in 0.0..=100.0f64,
        debt in 0.0..50_000.0f64,
    ) {
        let at = |income: f64| {
            let raw = record(json!({
                "Annual_Income": income,
                "Credit_Utilization_Ratio": util,
                "Outstanding_Debt": debt,
            }));
            MockModel::score(&normalize(&raw).unwrap())
        };
        prop_assert!(at(high) >= at(low));
        prop_assert!(at(high) <= 5);
    }
}
