use std::collections::BTreeMap;
use std::sync::Arc;

use crate::scoring::applicant::{ApplicantInput, ApplicantRecord, PriorDefaultInput};
use crate::scoring::encoder::{CategoryReferences, FeatureSchema};
use crate::scoring::model::artifacts::ModelInfo;
use crate::scoring::model::tree::{DecisionTree, TreeEnsemble, TreeExplainer, TreeNode, TreeObjective};
use crate::scoring::model::{
    ClassOutput, Classifier, Explainer, ModelAdapter, ModelFamily, ModelParts, RawExplanation,
};
use crate::scoring::{InferenceContext, ScoringPolicy};

pub(super) const FEATURES: [&str; 20] = [
    "person_age",
    "person_income",
    "loan_amnt",
    "loan_percent_income",
    "cb_person_cred_hist_length",
    "person_home_ownership_OTHER",
    "person_home_ownership_OWN",
    "person_home_ownership_RENT",
    "loan_intent_EDUCATION",
    "loan_intent_HOMEIMPROVEMENT",
    "loan_intent_MEDICAL",
    "loan_intent_PERSONAL",
    "loan_intent_VENTURE",
    "loan_grade_B",
    "loan_grade_C",
    "loan_grade_D",
    "loan_grade_E",
    "loan_grade_F",
    "loan_grade_G",
    "cb_person_default_on_file_Y",
];

pub(super) fn schema() -> FeatureSchema {
    FeatureSchema::new(FEATURES).expect("valid schema")
}

/// The dashboard's default applicant.
pub(super) fn input() -> ApplicantInput {
    ApplicantInput {
        age: 30,
        annual_income: 500_000,
        loan_amount: 200_000,
        loan_percent_income: 0.2,
        credit_history_length: 5,
        home_ownership: "RENT".to_string(),
        loan_intent: "EDUCATION".to_string(),
        loan_grade: "A".to_string(),
        prior_default: PriorDefaultInput::Flag(false),
    }
}

pub(super) fn record() -> ApplicantRecord {
    ApplicantRecord::try_from(input()).expect("valid record")
}

pub(super) fn record_with(change: impl FnOnce(&mut ApplicantInput)) -> ApplicantRecord {
    let mut raw = input();
    change(&mut raw);
    ApplicantRecord::try_from(raw).expect("valid record")
}

/// Classifier that ignores its input and reports a fixed default probability.
pub(super) struct FixedClassifier {
    pub declared: &'static str,
    pub width: usize,
    pub probability: f64,
}

impl Classifier for FixedClassifier {
    fn declared_type(&self) -> &str {
        self.declared
    }

    fn input_width(&self) -> usize {
        self.width
    }

    fn predict_proba(&self, _row: &[f64]) -> [f64; 2] {
        [1.0 - self.probability, self.probability]
    }
}

/// Explainer splitting a fixed share across every feature.
pub(super) struct UniformExplainer {
    pub share: f64,
    pub per_class: bool,
}

impl Explainer for UniformExplainer {
    fn explain(&self, row: &[f64]) -> RawExplanation {
        let positive = vec![self.share; row.len()];
        if self.per_class {
            let negative = positive.iter().map(|value| -value).collect();
            RawExplanation {
                values: ClassOutput::PerClass(vec![negative, positive]),
                base_value: ClassOutput::PerClass(vec![0.9, 0.1]),
            }
        } else {
            RawExplanation {
                values: ClassOutput::Single(positive),
                base_value: ClassOutput::Single(-3.0),
            }
        }
    }
}

pub(super) fn fixed_parts(declared: &'static str, probability: f64) -> ModelParts {
    ModelParts {
        model: Arc::new(FixedClassifier {
            declared,
            width: FEATURES.len(),
            probability,
        }),
        explainer: Arc::new(UniformExplainer {
            share: 0.01,
            per_class: false,
        }),
    }
}

pub(super) fn model_info(model_type: &str, family: ModelFamily) -> ModelInfo {
    ModelInfo {
        model_type: model_type.to_string(),
        family,
        version: "1.0.0".to_string(),
        metrics: BTreeMap::from([("auc".to_string(), 0.89), ("accuracy".to_string(), 0.85)]),
        feature_count: FEATURES.len(),
    }
}

/// Context over a tree-family stub that always predicts `probability`.
pub(super) fn stub_context(probability: f64) -> InferenceContext {
    let adapter = ModelAdapter::new(schema(), fixed_parts("XGBClassifier", probability), None)
        .expect("stub adapter");
    InferenceContext::new(
        schema(),
        CategoryReferences::default(),
        adapter,
        ScoringPolicy::default(),
        model_info("XGBClassifier", ModelFamily::Tree),
    )
    .expect("stub context")
}

/// Three small boosted trees over loan_percent_income, prior default, grade D, income and RENT.
/// The default applicant lands on leaves -0.9, -0.6 and 0.35, a margin of -2.65.
pub(super) fn ensemble() -> TreeEnsemble {
    let trees = vec![
        DecisionTree::new(vec![
            TreeNode::split(3, 0.3, 1, 4, 1000.0),
            TreeNode::split(19, 0.5, 2, 3, 800.0),
            TreeNode::leaf(-0.9, 700.0),
            TreeNode::leaf(0.4, 100.0),
            TreeNode::leaf(1.2, 200.0),
        ]),
        DecisionTree::new(vec![
            TreeNode::split(15, 0.5, 1, 4, 1000.0),
            TreeNode::split(1, 50_000.0, 2, 3, 850.0),
            TreeNode::leaf(0.3, 300.0),
            TreeNode::leaf(-0.6, 550.0),
            TreeNode::leaf(1.0, 150.0),
        ]),
        DecisionTree::new(vec![
            TreeNode::split(7, 0.5, 1, 2, 1000.0),
            TreeNode::leaf(-0.3, 600.0),
            TreeNode::leaf(0.35, 400.0),
        ]),
    ];

    TreeEnsemble::new(
        "XGBClassifier",
        FEATURES.len(),
        TreeObjective::LogisticMargin,
        -1.5,
        trees,
    )
    .expect("valid ensemble")
}

pub(super) fn tree_parts() -> ModelParts {
    let ensemble = Arc::new(ensemble());
    ModelParts {
        explainer: Arc::new(TreeExplainer::new(ensemble.clone())),
        model: ensemble,
    }
}

pub(super) fn tree_context() -> InferenceContext {
    let adapter = ModelAdapter::new(schema(), tree_parts(), None).expect("tree adapter");
    InferenceContext::new(
        schema(),
        CategoryReferences::default(),
        adapter,
        ScoringPolicy::default(),
        model_info("XGBClassifier", ModelFamily::Tree),
    )
    .expect("tree context")
}

pub(super) fn default_margin() -> f64 {
    -2.65
}
