use serde::Serialize;

use super::{ModelError, RawExplanation};
use crate::scoring::encoder::FeatureVector;

/// Signed contribution of one feature, with the encoded (unscaled) value it explains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub feature: String,
    pub contribution: f64,
    pub feature_value: f64,
}

/// One entry per schema feature, plus the baseline the contributions are measured from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionSet {
    pub baseline: f64,
    pub entries: Vec<Attribution>,
}

impl AttributionSet {
    pub(super) fn from_raw(
        vector: &FeatureVector,
        raw: RawExplanation,
        class: usize,
    ) -> Result<Self, ModelError> {
        let values = raw
            .values
            .select(class)
            .ok_or(ModelError::MissingClass(class))?;
        let baseline = raw
            .base_value
            .select(class)
            .ok_or(ModelError::MissingClass(class))?;

        if values.len() != vector.len() {
            return Err(ModelError::ExplanationShape {
                expected: vector.len(),
                found: values.len(),
            });
        }

        let entries = vector
            .iter()
            .zip(values)
            .map(|((feature, feature_value), contribution)| Attribution {
                feature: feature.to_string(),
                contribution,
                feature_value,
            })
            .collect();

        Ok(Self { baseline, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.feature == feature)
            .map(|entry| entry.contribution)
    }

    /// Baseline plus every contribution; approximates the model's raw output.
    pub fn total(&self) -> f64 {
        self.baseline
            + self
                .entries
                .iter()
                .map(|entry| entry.contribution)
                .sum::<f64>()
    }

    /// Entries by descending magnitude. Ties keep schema order.
    pub fn ranked(&self) -> Vec<&Attribution> {
        let mut ranked: Vec<&Attribution> = self.entries.iter().collect();
        ranked.sort_by(|left, right| {
            right
                .contribution
                .abs()
                .total_cmp(&left.contribution.abs())
        });
        ranked
    }
}
