use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

use crate::scoring::loan_router;

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json body")
}

fn evaluate_request(payload: Value) -> Request<Body> {
    Request::post("/api/v1/loan/evaluate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn evaluate_route_returns_view() {
    let router = loan_router(Arc::new(stub_context(0.03)));

    let response = router
        .oneshot(evaluate_request(
            serde_json::to_value(input()).expect("serializable input"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json(response).await;
    assert_eq!(payload["risk_band"], "low");
    assert_eq!(payload["label"], "Low Risk");
    assert_eq!(payload["color"], "green");
    assert_eq!(payload["advisory"]["items"].as_array().map(Vec::len), Some(5));
    assert_eq!(
        payload["attributions"].as_array().map(Vec::len),
        Some(FEATURES.len())
    );
    assert!(payload["context_message"]
        .as_str()
        .expect("message")
        .starts_with("Your profile risk is higher than 3% of applicants"));
}

#[tokio::test]
async fn evaluate_route_accepts_code_spellings() {
    let router = loan_router(Arc::new(stub_context(0.07)));

    let response = router
        .oneshot(evaluate_request(json!({
            "age": 41,
            "annual_income": 250000,
            "loan_amount": 150000,
            "loan_percent_income": 0.6,
            "credit_history_length": 12,
            "home_ownership": "own",
            "loan_intent": "HOME_IMPROVEMENT",
            "loan_grade": "c",
            "prior_default": "Y"
        })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json(response).await;
    assert_eq!(payload["risk_band"], "medium");
}

#[tokio::test]
async fn evaluate_route_rejects_unknown_grade() {
    let router = loan_router(Arc::new(stub_context(0.03)));
    let mut body = serde_json::to_value(input()).expect("serializable input");
    body["loan_grade"] = json!("Z");

    let response = router
        .oneshot(evaluate_request(body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = read_json(response).await;
    assert_eq!(payload["kind"], "unknown_category_value");
}

#[tokio::test]
async fn evaluate_route_rejects_malformed_body() {
    let router = loan_router(Arc::new(stub_context(0.03)));

    let response = router
        .oneshot(evaluate_request(json!({ "age": 30 })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = read_json(response).await;
    assert_eq!(payload["kind"], "invalid_applicant");
    assert!(payload["error"].as_str().expect("message").contains("missing field"));
}

#[tokio::test]
async fn evaluate_route_reports_negative_income_as_invalid_applicant() {
    let router = loan_router(Arc::new(stub_context(0.03)));
    let mut body = serde_json::to_value(input()).expect("serializable input");
    body["annual_income"] = json!(-5);

    let response = router
        .oneshot(evaluate_request(body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let payload = read_json(response).await;
    assert_eq!(payload["kind"], "invalid_applicant");
    assert!(payload["error"].as_str().expect("message").contains("annual_income"));
}

#[tokio::test]
async fn evaluate_route_reports_unparseable_json_with_kind() {
    let router = loan_router(Arc::new(stub_context(0.03)));

    let response = router
        .oneshot(
            Request::post("/api/v1/loan/evaluate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"age\": "))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let payload = read_json(response).await;
    assert_eq!(payload["kind"], "invalid_applicant");
}

#[tokio::test]
async fn model_route_describes_loaded_model() {
    let router = loan_router(Arc::new(stub_context(0.03)));

    let response = router
        .oneshot(
            Request::get("/api/v1/loan/model")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json(response).await;
    assert_eq!(payload["model_type"], "XGBClassifier");
    assert_eq!(payload["family"], "tree");
    assert_eq!(payload["metrics"]["auc"], 0.89);
    assert_eq!(payload["feature_count"], 20);
}
