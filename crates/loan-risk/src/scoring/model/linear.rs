//! Logistic regression, its standardizing scaler, and the linear attribution backend.

use std::sync::Arc;

use serde::Deserialize;

use super::{sigmoid, Classifier, ClassOutput, Explainer, FeatureScaler, RawExplanation};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinearError {
    #[error("{what} has {found} entries, expected {expected}")]
    Length {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{what} contains a non-finite value")]
    NonFinite { what: &'static str },
    #[error("model has no coefficients")]
    Empty,
}

fn check_finite(what: &'static str, values: &[f64]) -> Result<(), LinearError> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(LinearError::NonFinite { what })
    }
}

/// Binary logistic regression over standardized features.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogisticModel {
    model_type: String,
    coefficients: Vec<f64>,
    intercept: f64,
    /// Mean of the scaled training data; zeros when absent.
    #[serde(default)]
    background_mean: Option<Vec<f64>>,
}

impl LogisticModel {
    pub fn new(
        model_type: impl Into<String>,
        coefficients: Vec<f64>,
        intercept: f64,
        background_mean: Option<Vec<f64>>,
    ) -> Result<Self, LinearError> {
        let model = Self {
            model_type: model_type.into(),
            coefficients,
            intercept,
            background_mean,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), LinearError> {
        if self.coefficients.is_empty() {
            return Err(LinearError::Empty);
        }
        check_finite("coefficients", &self.coefficients)?;
        check_finite("intercept", &[self.intercept])?;

        if let Some(mean) = &self.background_mean {
            if mean.len() != self.coefficients.len() {
                return Err(LinearError::Length {
                    what: "background_mean",
                    expected: self.coefficients.len(),
                    found: mean.len(),
                });
            }
            check_finite("background_mean", mean)?;
        }

        Ok(())
    }

    /// Log-odds of default for a scaled row.
    pub fn decision_function(&self, scaled: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(scaled)
                .map(|(coefficient, value)| coefficient * value)
                .sum::<f64>()
    }

    fn background(&self, index: usize) -> f64 {
        self.background_mean
            .as_ref()
            .map(|mean| mean[index])
            .unwrap_or(0.0)
    }
}

impl Classifier for LogisticModel {
    fn declared_type(&self) -> &str {
        &self.model_type
    }

    fn input_width(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let positive = sigmoid(self.decision_function(row));
        [1.0 - positive, positive]
    }
}

/// Exact additive attributions of a linear model in log-odds space.
pub struct LinearExplainer {
    model: Arc<LogisticModel>,
}

impl LinearExplainer {
    pub fn new(model: Arc<LogisticModel>) -> Self {
        Self { model }
    }
}

impl Explainer for LinearExplainer {
    fn explain(&self, row: &[f64]) -> RawExplanation {
        let model = &self.model;
        let values = model
            .coefficients
            .iter()
            .zip(row)
            .enumerate()
            .map(|(index, (coefficient, value))| coefficient * (value - model.background(index)))
            .collect();
        let base_value = model.intercept
            + model
                .coefficients
                .iter()
                .enumerate()
                .map(|(index, coefficient)| coefficient * model.background(index))
                .sum::<f64>();

        RawExplanation {
            values: ClassOutput::Single(values),
            base_value: ClassOutput::Single(base_value),
        }
    }
}

/// Per-feature standardization `(x - mean) / scale` fitted on the training schema.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    features: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// A zero scale marks a constant training column and is treated as 1.
    pub fn new(features: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, LinearError> {
        for (what, found) in [("mean", mean.len()), ("scale", scale.len())] {
            if found != features.len() {
                return Err(LinearError::Length {
                    what,
                    expected: features.len(),
                    found,
                });
            }
        }
        check_finite("mean", &mean)?;
        check_finite("scale", &scale)?;

        let scale = scale
            .into_iter()
            .map(|value| if value == 0.0 { 1.0 } else { value })
            .collect();

        Ok(Self {
            features,
            mean,
            scale,
        })
    }
}

impl FeatureScaler for StandardScaler {
    fn input_width(&self) -> usize {
        self.features.len()
    }

    fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.features)
    }
}
