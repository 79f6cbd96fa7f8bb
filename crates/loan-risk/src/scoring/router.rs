use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use super::advisory::Advisory;
use super::applicant::ApplicantInput;
use super::context::{Evaluation, InferenceContext};
use super::model::Attribution;
use super::risk::{self, RiskBand};

/// Router exposing evaluation and model metadata over one shared context.
pub fn loan_router(context: Arc<InferenceContext>) -> Router {
    Router::new()
        .route("/api/v1/loan/evaluate", post(evaluate_handler))
        .route("/api/v1/loan/model", get(model_handler))
        .with_state(context)
}

/// Evaluation as presented to clients: the raw result plus display fields.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationView {
    pub probability: f64,
    pub percent: f64,
    pub risk_band: RiskBand,
    pub label: &'static str,
    pub color: &'static str,
    pub context_message: String,
    pub baseline: f64,
    /// Sorted by descending magnitude.
    pub attributions: Vec<Attribution>,
    pub advisory: Advisory,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationView {
    pub fn new(evaluation: Evaluation, evaluated_at: DateTime<Utc>) -> Self {
        let band = evaluation.risk_band;
        let attributions = evaluation
            .attributions
            .ranked()
            .into_iter()
            .cloned()
            .collect();

        Self {
            probability: evaluation.probability,
            percent: evaluation.probability * 100.0,
            risk_band: band,
            label: band.label(),
            color: band.color(),
            context_message: risk::context_message(evaluation.probability, band),
            baseline: evaluation.attributions.baseline,
            attributions,
            advisory: evaluation.advisory,
            evaluated_at,
        }
    }
}

const INVALID_APPLICANT: &str = "invalid_applicant";

/// Bodies that do not deserialize into an applicant keep axum's status code.
fn rejected_body(rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    warn!(kind = INVALID_APPLICANT, error = %message, "rejected evaluation request body");
    let payload = json!({
        "error": message,
        "kind": INVALID_APPLICANT,
    });
    (rejection.status(), axum::Json(payload)).into_response()
}

pub(crate) async fn evaluate_handler(
    State(context): State<Arc<InferenceContext>>,
    body: Result<axum::Json<ApplicantInput>, JsonRejection>,
) -> Response {
    let input = match body {
        Ok(axum::Json(input)) => input,
        Err(rejection) => return rejected_body(rejection),
    };

    match context.evaluate_input(input) {
        Ok(evaluation) => {
            let view = EvaluationView::new(evaluation, Utc::now());
            (StatusCode::OK, axum::Json(view)).into_response()
        }
        Err(error) => {
            warn!(kind = error.kind(), %error, "rejected evaluation request");
            let payload = json!({
                "error": error.to_string(),
                "kind": error.kind(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn model_handler(State(context): State<Arc<InferenceContext>>) -> Response {
    (StatusCode::OK, axum::Json(context.model_info().clone())).into_response()
}
