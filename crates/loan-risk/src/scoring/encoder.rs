//! Drop-first indicator encoding projected onto the trained model's feature schema.
//!
//! Encoding happens in two steps. The record first expands into a working set of named
//! values: numeric attributes under their schema names, and one `field_VALUE` indicator for
//! every non-reference category of each categorical attribute. The working set is then
//! projected onto the schema: names the schema lists but the expansion did not produce are
//! zero-filled, and produced names the schema does not list are discarded. The resulting
//! vector therefore always has the schema's width and order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::applicant::{
    ApplicantRecord, Categorical, DefaultOnFile, HomeOwnership, LoanGrade, LoanIntent,
    UnknownCategoryValue,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryValue),
    #[error("feature schema is empty")]
    EmptySchema,
    #[error("feature schema lists '{0}' more than once")]
    DuplicateFeature(String),
    #[error("expected {expected} feature values, found {found}")]
    WidthMismatch { expected: usize, found: usize },
}

/// Ordered feature names agreed between training and inference. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    names: Arc<[String]>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(EncodingError::EmptySchema);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(EncodingError::DuplicateFeature(name.clone()));
            }
        }

        Ok(Self {
            names: names.into(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; an empty schema is rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.names, &other.names) || self.names == other.names
    }
}

impl Eq for FeatureSchema {}

/// Values laid out in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(schema: FeatureSchema, values: Vec<f64>) -> Result<Self, EncodingError> {
        if schema.len() != values.len() {
            return Err(EncodingError::WidthMismatch {
                expected: schema.len(),
                found: values.len(),
            });
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.position(name).map(|index| self.values[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Reference category per categorical field; the reference yields no indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryReferences {
    references: BTreeMap<String, String>,
}

impl Default for CategoryReferences {
    /// Drop-first references: the lexicographically first training value of each field.
    fn default() -> Self {
        Self::empty()
            .with_reference(HomeOwnership::FIELD, HomeOwnership::Mortgage.code())
            .with_reference(LoanIntent::FIELD, LoanIntent::DebtConsolidation.code())
            .with_reference(LoanGrade::FIELD, LoanGrade::A.code())
            .with_reference(DefaultOnFile::FIELD, DefaultOnFile::No.code())
    }
}

impl CategoryReferences {
    pub fn empty() -> Self {
        Self {
            references: BTreeMap::new(),
        }
    }

    pub fn with_reference(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.references.insert(field.into(), value.into());
        self
    }

    /// Resolves the reference for `field`, falling back to the first value in sort order.
    pub fn reference_for(
        &self,
        field: &str,
        domain: &[&'static str],
    ) -> Result<&'static str, UnknownCategoryValue> {
        match self.references.get(field) {
            Some(configured) => domain
                .iter()
                .copied()
                .find(|value| *value == configured.as_str())
                .ok_or_else(|| UnknownCategoryValue {
                    field: field.to_string(),
                    value: configured.clone(),
                }),
            None => domain.iter().copied().min().ok_or_else(|| UnknownCategoryValue {
                field: field.to_string(),
                value: String::new(),
            }),
        }
    }
}

/// Turns applicant records into model-ready vectors for one fixed schema.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
    references: CategoryReferences,
}

impl FeatureEncoder {
    pub fn new(schema: FeatureSchema, references: CategoryReferences) -> Self {
        Self { schema, references }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encode(&self, record: &ApplicantRecord) -> Result<FeatureVector, EncodingError> {
        let mut produced: HashMap<String, f64> = HashMap::new();

        for (name, value) in record.numeric_features() {
            produced.insert(name.to_string(), value);
        }

        for feature in record.categorical_features() {
            if !feature.domain.contains(&feature.value) {
                return Err(UnknownCategoryValue {
                    field: feature.field.to_string(),
                    value: feature.value.to_string(),
                }
                .into());
            }

            let reference = self
                .references
                .reference_for(feature.field, &feature.domain)?;

            for candidate in feature.domain.iter().filter(|value| **value != reference) {
                let indicator = if *candidate == feature.value { 1.0 } else { 0.0 };
                produced.insert(format!("{}_{}", feature.field, candidate), indicator);
            }
        }

        let values: Vec<f64> = self
            .schema
            .names()
            .iter()
            .map(|name| produced.get(name).copied().unwrap_or(0.0))
            .collect();

        trace!(
            produced = produced.len(),
            schema = self.schema.len(),
            "projected applicant onto feature schema"
        );

        FeatureVector::new(self.schema.clone(), values)
    }
}

/// Single-call form of [`FeatureEncoder::encode`].
pub fn encode(
    record: &ApplicantRecord,
    schema: &FeatureSchema,
    references: &CategoryReferences,
) -> Result<FeatureVector, EncodingError> {
    FeatureEncoder::new(schema.clone(), references.clone()).encode(record)
}
