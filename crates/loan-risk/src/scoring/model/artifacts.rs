use super::linear::{LinearError, LinearExplainer, LogisticModel, StandardScaler};
use super::tree::{TreeEnsemble, TreeError, TreeExplainer};
use super::{ModelError, ModelFamily, ModelParts};
use crate::scoring::encoder::{EncodingError, FeatureSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DEFAULT_MODEL_VERSION: &str = "1.0.0";

#[derive(Debug)]
pub enum ArtifactLoadFailure {
    Io { path: PathBuf, source: std::io::Error },
    Csv(csv::Error),
    Json(serde_json::Error),
    Tree(TreeError),
    Linear(LinearError),
    Model(ModelError),
    Encoding(EncodingError),
    Invalid(String),
}

impl std::fmt::Display for ArtifactLoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactLoadFailure::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ArtifactLoadFailure::Csv(err) => write!(f, "invalid scaler CSV data: {}", err),
            ArtifactLoadFailure::Json(err) => write!(f, "invalid artifact JSON: {}", err),
            ArtifactLoadFailure::Tree(err) => write!(f, "invalid tree ensemble: {}", err),
            ArtifactLoadFailure::Linear(err) => write!(f, "invalid linear artifact: {}", err),
            ArtifactLoadFailure::Model(err) => write!(f, "unusable model: {}", err),
            ArtifactLoadFailure::Encoding(err) => write!(f, "invalid feature schema: {}", err),
            ArtifactLoadFailure::Invalid(reason) => write!(f, "invalid artifact: {}", reason),
        }
    }
}

impl std::error::Error for ArtifactLoadFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactLoadFailure::Io { source, .. } => Some(source),
            ArtifactLoadFailure::Csv(err) => Some(err),
            ArtifactLoadFailure::Json(err) => Some(err),
            ArtifactLoadFailure::Tree(err) => Some(err),
            ArtifactLoadFailure::Linear(err) => Some(err),
            ArtifactLoadFailure::Model(err) => Some(err),
            ArtifactLoadFailure::Encoding(err) => Some(err),
            ArtifactLoadFailure::Invalid(_) => None,
        }
    }
}

impl From<csv::Error> for ArtifactLoadFailure {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<serde_json::Error> for ArtifactLoadFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<TreeError> for ArtifactLoadFailure {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<LinearError> for ArtifactLoadFailure {
    fn from(err: LinearError) -> Self {
        Self::Linear(err)
    }
}

impl From<ModelError> for ArtifactLoadFailure {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}

impl From<EncodingError> for ArtifactLoadFailure {
    fn from(err: EncodingError) -> Self {
        Self::Encoding(err)
    }
}

fn open(path: &Path) -> Result<std::fs::File, ArtifactLoadFailure> {
    std::fs::File::open(path).map_err(|source| ArtifactLoadFailure::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Descriptive metadata shown alongside predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub family: ModelFamily,
    pub version: String,
    /// Offline evaluation figures such as `auc` and `accuracy`.
    pub metrics: BTreeMap<String, f64>,
    pub feature_count: usize,
}

#[derive(Debug, Deserialize)]
struct ModelHeader {
    model_type: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    metrics: BTreeMap<String, f64>,
}

/// Model plus its explainer and metadata, as read from one model artifact.
pub struct LoadedModel {
    pub parts: ModelParts,
    pub info: ModelInfo,
}

/// Feature schema artifact: a JSON array of column names in training order.
pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<FeatureSchema, ArtifactLoadFailure> {
    let path = path.as_ref();
    let schema = read_schema(open(path)?)?;
    info!(path = %path.display(), features = schema.len(), "loaded feature schema");
    Ok(schema)
}

pub fn read_schema<R: Read>(reader: R) -> Result<FeatureSchema, ArtifactLoadFailure> {
    let names: Vec<String> = serde_json::from_reader(reader)?;
    Ok(FeatureSchema::new(names)?)
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<LoadedModel, ArtifactLoadFailure> {
    let path = path.as_ref();
    let loaded = read_model(open(path)?)?;
    info!(
        path = %path.display(),
        model_type = %loaded.info.model_type,
        family = loaded.info.family.label(),
        version = %loaded.info.version,
        "loaded model"
    );
    Ok(loaded)
}

/// Reads a model artifact, choosing the payload layout from its declared `model_type`.
pub fn read_model<R: Read>(reader: R) -> Result<LoadedModel, ArtifactLoadFailure> {
    let document: serde_json::Value = serde_json::from_reader(reader)?;
    let header = ModelHeader::deserialize(&document)?;
    let family = ModelFamily::detect(&header.model_type)?;

    let (parts, feature_count) = match family {
        ModelFamily::Tree => {
            let ensemble = TreeEnsemble::deserialize(&document)?;
            ensemble.validate()?;
            let ensemble = Arc::new(ensemble);
            let width = super::Classifier::input_width(ensemble.as_ref());
            let parts = ModelParts {
                explainer: Arc::new(TreeExplainer::new(ensemble.clone())),
                model: ensemble,
            };
            (parts, width)
        }
        ModelFamily::Linear => {
            let model = LogisticModel::deserialize(&document)?;
            model.validate()?;
            let model = Arc::new(model);
            let width = super::Classifier::input_width(model.as_ref());
            let parts = ModelParts {
                explainer: Arc::new(LinearExplainer::new(model.clone())),
                model,
            };
            (parts, width)
        }
    };

    Ok(LoadedModel {
        parts,
        info: ModelInfo {
            model_type: header.model_type,
            family,
            version: header
                .version
                .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string()),
            metrics: header.metrics,
            feature_count,
        },
    })
}

#[derive(Debug, Deserialize)]
struct ScalerRow {
    feature: String,
    mean: f64,
    scale: f64,
}

pub fn load_scaler<P: AsRef<Path>>(path: P) -> Result<StandardScaler, ArtifactLoadFailure> {
    let path = path.as_ref();
    let scaler = read_scaler(open(path)?)?;
    info!(
        path = %path.display(),
        features = super::FeatureScaler::input_width(&scaler),
        "loaded scaler"
    );
    Ok(scaler)
}

/// Scaler artifact: CSV with a `feature,mean,scale` header, one row per schema feature.
pub fn read_scaler<R: Read>(reader: R) -> Result<StandardScaler, ArtifactLoadFailure> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut features = Vec::new();
    let mut mean = Vec::new();
    let mut scale = Vec::new();
    for record in csv_reader.deserialize::<ScalerRow>() {
        let row = record?;
        features.push(row.feature);
        mean.push(row.mean);
        scale.push(row.scale);
    }

    if features.is_empty() {
        return Err(ArtifactLoadFailure::Invalid(
            "scaler artifact has no rows".to_string(),
        ));
    }

    Ok(StandardScaler::new(features, mean, scale)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::model::FeatureScaler;
    use std::io::Cursor;

    #[test]
    fn reads_tree_model_with_metadata() {
        let json = r#"{
            "model_type": "XGBClassifier",
            "version": "2.1.0",
            "metrics": {"auc": 0.89, "accuracy": 0.85},
            "n_features": 2,
            "objective": "logistic_margin",
            "base_score": -1.0,
            "trees": [{"nodes": [
                {"value": 0.0, "cover": 10.0, "split": {"feature": 1, "threshold": 0.5, "left": 1, "right": 2}},
                {"value": -0.5, "cover": 6.0},
                {"value": 0.7, "cover": 4.0}
            ]}]
        }"#;

        let loaded = read_model(Cursor::new(json)).expect("model loads");
        assert_eq!(loaded.info.family, ModelFamily::Tree);
        assert_eq!(loaded.info.version, "2.1.0");
        assert_eq!(loaded.info.metrics.get("auc"), Some(&0.89));
        assert_eq!(loaded.info.metrics.get("accuracy"), Some(&0.85));
        assert_eq!(loaded.info.feature_count, 2);
        assert_eq!(loaded.parts.model.input_width(), 2);
    }

    #[test]
    fn reads_linear_model_and_defaults_version() {
        let json = r#"{
            "model_type": "LogisticRegression",
            "coefficients": [0.4, -0.2],
            "intercept": -3.0
        }"#;

        let loaded = read_model(Cursor::new(json)).expect("model loads");
        assert_eq!(loaded.info.family, ModelFamily::Linear);
        assert_eq!(loaded.info.version, DEFAULT_MODEL_VERSION);
        assert!(loaded.info.metrics.is_empty());
    }

    #[test]
    fn rejects_unsupported_model_type() {
        let json = r#"{"model_type": "KNeighborsClassifier"}"#;
        let error = read_model(Cursor::new(json)).err().expect("load fails");
        assert!(matches!(
            error,
            ArtifactLoadFailure::Model(ModelError::UnsupportedModelFamily { .. })
        ));
    }

    #[test]
    fn reads_scaler_csv_with_padding() {
        let csv = "feature, mean, scale\nperson_age, 27.7, 6.3\nloan_grade_G, 0.0, 0.0\n";
        let scaler = read_scaler(Cursor::new(csv)).expect("scaler loads");

        assert_eq!(
            scaler.feature_names(),
            Some(&["person_age".to_string(), "loan_grade_G".to_string()][..])
        );
        assert_eq!(scaler.transform(&[27.7, 1.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn rejects_empty_schema() {
        let error = read_schema(Cursor::new("[]")).err().expect("load fails");
        assert!(matches!(
            error,
            ArtifactLoadFailure::Encoding(EncodingError::EmptySchema)
        ));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = load_schema("./does-not-exist.json")
            .err()
            .expect("load fails");
        assert!(error.to_string().contains("does-not-exist.json"));
    }
}
