//! End-to-end scenarios through the request handler with the mock fallback

use chrono::Utc;
use scoring_lib::predictor::MockModel;
use scoring_lib::{ModelContext, ModelOrigin, RequestHandler};
use serde_json::{json, Value};

fn handler() -> RequestHandler {
    RequestHandler::new(ModelContext::mock())
}

#[test]
fn scenario_high_income_low_utilization_is_good() {
    let data = json!({
        "Age": 42,
        "Annual_Income": 120000,
        "Monthly_Inhand_Salary": 9500,
        "Num_Bank_Accounts": 3,
        "Num_Credit_Card": 2,
        "Interest_Rate": 8,
        "Num_of_Loan": 1,
        "Outstanding_Debt": 15000,
        "Credit_Utilization_Ratio": 18.0,
        "Credit_Mix": "Good",
        "Payment_of_Min_Amount": "No"
    });

    let record = scoring_lib::predictor::normalize(data.as_object().unwrap()).unwrap();
    let score = MockModel::score(&record);
    assert!(score == 4 || score == 5);

    let response = handler().handle(&json!({ "data": data }));
    assert_eq!(response.status, 200);
    assert_eq!(response.body["prediction"], "Good");
    assert_eq!(response.body["confidence"], 0.8);
}

#[test]
fn scenario_low_income_high_utilization_is_poor() {
    let data = json!({
        "Age": 26,
        "Annual_Income": 28000,
        "Credit_Utilization_Ratio": 89.0,
        "Outstanding_Debt": 22000
    });

    let record = scoring_lib::predictor::normalize(data.as_object().unwrap()).unwrap();
    assert_eq!(MockModel::score(&record), 0);

    let response = handler().handle(&json!({ "data": data }));
    assert_eq!(response.status, 200);
    assert_eq!(response.body["prediction"], "Poor");
    assert_eq!(response.body["probabilities"]["Poor"], 0.75);
}

#[test]
fn scenario_invalid_age_is_rejected() {
    let response = handler().handle(&json!({"data": {"Age": "invalid", "Annual_Income": -1000}}));
    assert_eq!(response.status, 400);
    assert!(response.body.get("error").is_some());
    assert!(response.body.get("prediction").is_none());
}

#[test]
fn scenario_empty_data_uses_defaults() {
    let response = handler().handle(&json!({"data": {}}));
    assert_eq!(response.status, 200);
    let prediction = response.body["prediction"].as_str().unwrap();
    assert!(["Good", "Standard", "Poor"].contains(&prediction));
}

#[test]
fn direct_and_gateway_events_produce_identical_bodies() {
    let handler = handler();
    let now = Utc::now();
    let data = json!({"Age": 35, "Annual_Income": 45000, "Occupation": "Architect"});

    let direct = handler.handle_at(&json!({ "data": data.clone() }), now);
    let body = json!({ "data": data }).to_string();
    let wrapped = handler.handle_at(
        &json!({"body": body, "headers": {"Content-Type": "application/json"}}),
        now,
    );

    assert_eq!(direct, wrapped);
}

#[test]
fn gateway_response_carries_envelope_as_text() {
    let response = handler().handle_gateway(&json!({"body": "{\"data\": {\"Age\": 50}}"}));
    assert_eq!(response.status_code, 200);

    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["model_name"], "mock_credit_score_model");
}

#[test]
fn mock_origin_is_visible_to_callers() {
    let handler = handler();
    assert_eq!(handler.descriptor().origin, ModelOrigin::Mock);
    assert!(handler.descriptor().description.is_some());
}
