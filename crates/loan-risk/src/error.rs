use crate::config::ConfigError;
use crate::scoring::{ArtifactLoadFailure, EvaluationError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Artifact(ArtifactLoadFailure),
    Evaluation(EvaluationError),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration",
            AppError::Telemetry(_) => "telemetry",
            AppError::Io(_) => "io",
            AppError::Server(_) => "server",
            AppError::Artifact(_) => "artifact_load_failure",
            AppError::Evaluation(err) => err.kind(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Artifact(err) => write!(f, "artifact error: {}", err),
            AppError::Evaluation(err) => write!(f, "evaluation rejected: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Artifact(err) => Some(err),
            AppError::Evaluation(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Evaluation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string(), "kind": self.kind() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ArtifactLoadFailure> for AppError {
    fn from(value: ArtifactLoadFailure) -> Self {
        Self::Artifact(value)
    }
}

impl From<EvaluationError> for AppError {
    fn from(value: EvaluationError) -> Self {
        Self::Evaluation(value)
    }
}
