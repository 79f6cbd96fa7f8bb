//! The loaded, immutable artifacts and the end-to-end `evaluate` operation.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::advisory::{Advisory, AdvisoryEngine};
use super::applicant::{ApplicantError, ApplicantInput, ApplicantRecord};
use super::encoder::{CategoryReferences, EncodingError, FeatureEncoder, FeatureSchema};
use super::model::artifacts::{self, ArtifactLoadFailure, ModelInfo};
use super::model::{AttributionSet, FeatureScaler, ModelAdapter, ModelError, ModelFamily};
use super::risk::{self, RiskBand, RiskError, RiskThresholds};
use super::ScoringPolicy;
use crate::config::ArtifactPaths;

/// Per-request failures. None of them leave partial output behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Applicant(#[from] ApplicantError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Risk(#[from] RiskError),
}

impl EvaluationError {
    /// Stable machine-readable code reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationError::Applicant(ApplicantError::UnknownCategory(_))
            | EvaluationError::Encoding(EncodingError::UnknownCategory(_)) => {
                "unknown_category_value"
            }
            EvaluationError::Applicant(ApplicantError::InvalidField { .. }) => "invalid_applicant",
            EvaluationError::Encoding(EncodingError::EmptySchema) => "empty_schema",
            EvaluationError::Encoding(_) => "schema_mismatch",
            EvaluationError::Model(ModelError::UnsupportedModelFamily { .. }) => {
                "unsupported_model_family"
            }
            EvaluationError::Model(ModelError::MissingScaler { .. }) => "artifact_load_failure",
            EvaluationError::Model(_) => "schema_mismatch",
            EvaluationError::Risk(RiskError::ProbabilityOutOfRange(_)) => {
                "probability_out_of_range"
            }
            EvaluationError::Risk(RiskError::InvalidThresholds { .. }) => "invalid_policy",
        }
    }
}

/// Atomic result of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub probability: f64,
    pub risk_band: RiskBand,
    pub attributions: AttributionSet,
    pub advisory: Advisory,
}

/// Schema, model, scaler, and policy fixed at startup and shared by every request.
pub struct InferenceContext {
    encoder: FeatureEncoder,
    adapter: ModelAdapter,
    thresholds: RiskThresholds,
    advisory: AdvisoryEngine,
    model_info: ModelInfo,
}

impl InferenceContext {
    /// Fails unless the adapter was built for exactly this schema.
    pub fn new(
        schema: FeatureSchema,
        references: CategoryReferences,
        adapter: ModelAdapter,
        policy: ScoringPolicy,
        model_info: ModelInfo,
    ) -> Result<Self, ArtifactLoadFailure> {
        if adapter.schema() != &schema {
            return Err(ModelError::SchemaMismatch {
                reason: "model adapter was built for a different feature schema".to_string(),
            }
            .into());
        }

        Ok(Self {
            encoder: FeatureEncoder::new(schema, references),
            adapter,
            thresholds: policy.risk,
            advisory: AdvisoryEngine::new(policy.advisory),
            model_info,
        })
    }

    /// Loads schema, model, and scaler. All three must be present and agree on the
    /// feature columns, whichever family the model belongs to.
    pub fn load(paths: &ArtifactPaths, policy: ScoringPolicy) -> Result<Self, ArtifactLoadFailure> {
        let schema = artifacts::load_schema(&paths.schema)?;
        let loaded = artifacts::load_model(&paths.model)?;
        let scaler: Arc<dyn FeatureScaler> = Arc::new(artifacts::load_scaler(&paths.scaler)?);

        let adapter = ModelAdapter::new(schema.clone(), loaded.parts, Some(scaler))?;
        let context = Self::new(
            schema,
            CategoryReferences::default(),
            adapter,
            policy,
            loaded.info,
        )?;

        info!(
            family = context.adapter.family().label(),
            features = context.encoder.schema().len(),
            "inference context ready"
        );
        Ok(context)
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.encoder.schema()
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn family(&self) -> ModelFamily {
        self.adapter.family()
    }

    pub fn evaluate(&self, record: &ApplicantRecord) -> Result<Evaluation, EvaluationError> {
        let vector = self.encoder.encode(record)?;
        let probability = self.adapter.score(&vector)?;
        let risk_band = risk::classify(probability, &self.thresholds)?;
        let attributions = self.adapter.explain(&vector)?;
        let advisory = self.advisory.advise(record, risk_band);

        debug!(probability, band = ?risk_band, "evaluated applicant");

        Ok(Evaluation {
            probability,
            risk_band,
            attributions,
            advisory,
        })
    }

    /// Validates raw input, then evaluates it.
    pub fn evaluate_input(&self, input: ApplicantInput) -> Result<Evaluation, EvaluationError> {
        let record = ApplicantRecord::try_from(input)?;
        self.evaluate(&record)
    }
}
