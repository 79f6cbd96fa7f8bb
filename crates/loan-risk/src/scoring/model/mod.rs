//! Model adapter over the two supported estimator families.
//!
//! Tree ensembles score the encoded vector as-is and are explained with TreeSHAP. Linear
//! models need the fitted scaler applied first; their explanation is computed in scaled
//! space and reported against the original feature names. The family is resolved once,
//! when the adapter is built.

pub mod artifacts;
mod attribution;
pub mod linear;
pub mod tree;

pub use attribution::{Attribution, AttributionSet};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::encoder::{FeatureSchema, FeatureVector};

/// Index of the default ("bad loan") class in classifier outputs.
pub const POSITIVE_CLASS: usize = 1;

/// A fitted binary classifier.
pub trait Classifier: Send + Sync {
    /// Estimator type name recorded at training time, e.g. `XGBClassifier`.
    fn declared_type(&self) -> &str;
    fn input_width(&self) -> usize;
    fn predict_proba(&self, row: &[f64]) -> [f64; 2];
}

/// A fitted per-feature scaling transform.
pub trait FeatureScaler: Send + Sync {
    fn input_width(&self) -> usize;
    fn transform(&self, row: &[f64]) -> Vec<f64>;

    /// Feature names the scaler was fitted on, when the artifact records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

/// Additive-attribution backend bound to one model.
pub trait Explainer: Send + Sync {
    fn explain(&self, row: &[f64]) -> RawExplanation;
}

/// Backend output that is either a single series or one series per class.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassOutput<T> {
    Single(T),
    PerClass(Vec<T>),
}

impl<T> ClassOutput<T> {
    fn select(self, class: usize) -> Option<T> {
        match self {
            ClassOutput::Single(value) => Some(value),
            ClassOutput::PerClass(values) => values.into_iter().nth(class),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawExplanation {
    pub values: ClassOutput<Vec<f64>>,
    pub base_value: ClassOutput<f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("feature vector does not match the model schema: {reason}")]
    SchemaMismatch { reason: String },
    #[error("model type '{declared}' is neither a tree ensemble nor a linear model")]
    UnsupportedModelFamily { declared: String },
    #[error("linear model '{declared}' requires a fitted scaler")]
    MissingScaler { declared: String },
    #[error("explanation backend returned {found} attributions for {expected} features")]
    ExplanationShape { expected: usize, found: usize },
    #[error("explanation backend has no output for class {0}")]
    MissingClass(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Tree,
    Linear,
}

impl ModelFamily {
    const LINEAR_MARKERS: [&'static str; 4] = [
        "LogisticRegression",
        "LinearRegression",
        "SGDClassifier",
        "LinearSVC",
    ];
    const TREE_MARKERS: [&'static str; 6] = ["Forest", "Tree", "Boost", "XGB", "LGBM", "CatBoost"];

    /// Resolves the family from an estimator type name.
    pub fn detect(declared_type: &str) -> Result<Self, ModelError> {
        if Self::LINEAR_MARKERS
            .iter()
            .any(|marker| declared_type.contains(marker))
        {
            return Ok(Self::Linear);
        }

        if Self::TREE_MARKERS
            .iter()
            .any(|marker| declared_type.contains(marker))
        {
            return Ok(Self::Tree);
        }

        Err(ModelError::UnsupportedModelFamily {
            declared: declared_type.to_string(),
        })
    }

    pub const fn label(self) -> &'static str {
        match self {
            ModelFamily::Tree => "tree_ensemble",
            ModelFamily::Linear => "linear",
        }
    }
}

/// The model and the explanation backend built for it.
#[derive(Clone)]
pub struct ModelParts {
    pub model: Arc<dyn Classifier>,
    pub explainer: Arc<dyn Explainer>,
}

pub struct TreeVariant {
    schema: FeatureSchema,
    model: Arc<dyn Classifier>,
    explainer: Arc<dyn Explainer>,
}

pub struct LinearVariant {
    schema: FeatureSchema,
    model: Arc<dyn Classifier>,
    scaler: Arc<dyn FeatureScaler>,
    explainer: Arc<dyn Explainer>,
}

/// Uniform `score`/`explain` contract over the supported families.
pub enum ModelAdapter {
    Tree(TreeVariant),
    Linear(LinearVariant),
}

impl ModelAdapter {
    /// Selects the variant from the model's declared type and checks widths against `schema`.
    /// The scaler is required for linear models. Tree ensembles do not apply it, but a
    /// supplied scaler must still match the schema.
    pub fn new(
        schema: FeatureSchema,
        parts: ModelParts,
        scaler: Option<Arc<dyn FeatureScaler>>,
    ) -> Result<Self, ModelError> {
        let ModelParts { model, explainer } = parts;
        let family = ModelFamily::detect(model.declared_type())?;

        if model.input_width() != schema.len() {
            return Err(ModelError::SchemaMismatch {
                reason: format!(
                    "model expects {} features, schema lists {}",
                    model.input_width(),
                    schema.len()
                ),
            });
        }

        if let Some(scaler) = &scaler {
            check_scaler(scaler.as_ref(), &schema)?;
        }

        match family {
            ModelFamily::Tree => Ok(Self::Tree(TreeVariant {
                schema,
                model,
                explainer,
            })),
            ModelFamily::Linear => {
                let scaler = scaler.ok_or_else(|| ModelError::MissingScaler {
                    declared: model.declared_type().to_string(),
                })?;

                Ok(Self::Linear(LinearVariant {
                    schema,
                    model,
                    scaler,
                    explainer,
                }))
            }
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelAdapter::Tree(_) => ModelFamily::Tree,
            ModelAdapter::Linear(_) => ModelFamily::Linear,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        match self {
            ModelAdapter::Tree(variant) => &variant.schema,
            ModelAdapter::Linear(variant) => &variant.schema,
        }
    }

    pub fn declared_type(&self) -> &str {
        match self {
            ModelAdapter::Tree(variant) => variant.model.declared_type(),
            ModelAdapter::Linear(variant) => variant.model.declared_type(),
        }
    }

    /// Probability of default for one encoded applicant.
    pub fn score(&self, vector: &FeatureVector) -> Result<f64, ModelError> {
        self.check(vector)?;

        let proba = match self {
            ModelAdapter::Tree(variant) => variant.model.predict_proba(vector.values()),
            ModelAdapter::Linear(variant) => {
                let scaled = variant.scaler.transform(vector.values());
                variant.model.predict_proba(&scaled)
            }
        };

        Ok(proba[POSITIVE_CLASS])
    }

    /// Per-feature contributions towards the default class, keyed by schema name.
    pub fn explain(&self, vector: &FeatureVector) -> Result<AttributionSet, ModelError> {
        self.check(vector)?;

        let raw = match self {
            ModelAdapter::Tree(variant) => variant.explainer.explain(vector.values()),
            ModelAdapter::Linear(variant) => {
                let scaled = variant.scaler.transform(vector.values());
                variant.explainer.explain(&scaled)
            }
        };

        AttributionSet::from_raw(vector, raw, POSITIVE_CLASS)
    }

    fn check(&self, vector: &FeatureVector) -> Result<(), ModelError> {
        let schema = self.schema();
        if vector.len() != schema.len() {
            return Err(ModelError::SchemaMismatch {
                reason: format!(
                    "vector has {} features, model expects {}",
                    vector.len(),
                    schema.len()
                ),
            });
        }

        if vector.schema() != schema {
            let position = vector
                .schema()
                .names()
                .iter()
                .zip(schema.names())
                .position(|(found, expected)| found != expected)
                .unwrap_or(0);
            return Err(ModelError::SchemaMismatch {
                reason: format!(
                    "feature {} is '{}' but the model expects '{}'",
                    position,
                    vector.schema().names()[position],
                    schema.names()[position]
                ),
            });
        }

        Ok(())
    }
}

/// A scaler is consistent when it was fitted on the schema's width and, if it records
/// names, on the same columns in the same order.
fn check_scaler(scaler: &dyn FeatureScaler, schema: &FeatureSchema) -> Result<(), ModelError> {
    if scaler.input_width() != schema.len() {
        return Err(ModelError::SchemaMismatch {
            reason: format!(
                "scaler was fitted on {} features, schema lists {}",
                scaler.input_width(),
                schema.len()
            ),
        });
    }

    if let Some(names) = scaler.feature_names() {
        if names != schema.names() {
            return Err(ModelError::SchemaMismatch {
                reason: "scaler feature names differ from the schema".to_string(),
            });
        }
    }

    Ok(())
}

/// Numerically stable logistic function.
pub(crate) fn sigmoid(margin: f64) -> f64 {
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let exp = margin.exp();
        exp / (1.0 + exp)
    }
}
