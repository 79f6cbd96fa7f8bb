pub mod advisory;
pub mod applicant;
pub mod context;
pub mod encoder;
pub mod model;
pub mod risk;
pub mod router;

#[cfg(test)]
mod tests;

pub use advisory::{AdviceItem, AdviceTopic, Advisory, AdvisoryConfig, AdvisoryEngine, Sentiment};
pub use applicant::{ApplicantError, ApplicantInput, ApplicantRecord, PriorDefaultInput};
pub use context::{Evaluation, EvaluationError, InferenceContext};
pub use encoder::{encode, CategoryReferences, FeatureEncoder, FeatureSchema, FeatureVector};
pub use model::artifacts::{ArtifactLoadFailure, ModelInfo};
pub use model::{Attribution, AttributionSet, ModelAdapter, ModelFamily};
pub use risk::{classify, RiskBand, RiskThresholds};
pub use router::loan_router;

/// Tunable thresholds for banding and advice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringPolicy {
    pub risk: RiskThresholds,
    pub advisory: AdvisoryConfig,
}
