//! Decision-tree ensembles and their exact path-dependent TreeSHAP explainer.

use std::sync::Arc;

use serde::Deserialize;

use super::{sigmoid, Classifier, ClassOutput, Explainer, RawExplanation};

/// How leaf values combine into the ensemble output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeObjective {
    /// Leaves sum to a log-odds margin (gradient boosting).
    #[default]
    LogisticMargin,
    /// Leaves hold class-1 probabilities that are averaged (random forests).
    AveragedProbability,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error("ensemble contains no trees")]
    Empty,
    #[error("tree {tree} node {node}: {reason}")]
    InvalidNode {
        tree: usize,
        node: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

/// A node; internal when it carries a split. `cover` is the training sample weight.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub split: Option<Split>,
    #[serde(default)]
    pub value: f64,
    pub cover: f64,
}

impl TreeNode {
    pub fn leaf(value: f64, cover: f64) -> Self {
        Self {
            split: None,
            value,
            cover,
        }
    }

    pub fn split(feature: usize, threshold: f64, left: usize, right: usize, cover: f64) -> Self {
        Self {
            split: Some(Split {
                feature,
                threshold,
                left,
                right,
            }),
            value: 0.0,
            cover,
        }
    }
}

/// Nodes in array form, root at index 0. Rows go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    fn validate(&self, tree: usize, n_features: usize) -> Result<(), TreeError> {
        let invalid = |node: usize, reason: String| TreeError::InvalidNode { tree, node, reason };

        if self.nodes.is_empty() {
            return Err(invalid(0, "tree has no nodes".to_string()));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if !node.cover.is_finite() || node.cover <= 0.0 {
                return Err(invalid(index, format!("cover {} must be positive", node.cover)));
            }
            if !node.value.is_finite() {
                return Err(invalid(index, "leaf value is not finite".to_string()));
            }

            if let Some(split) = node.split {
                if split.feature >= n_features {
                    return Err(invalid(
                        index,
                        format!(
                            "split feature {} exceeds width {}",
                            split.feature, n_features
                        ),
                    ));
                }
                for child in [split.left, split.right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(invalid(index, format!("child index {child} is invalid")));
                    }
                }
                if split.left == split.right {
                    return Err(invalid(index, "children must differ".to_string()));
                }
            }
        }

        Ok(())
    }

    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        while let Some(split) = self.nodes[index].split {
            index = if row[split.feature] <= split.threshold {
                split.left
            } else {
                split.right
            };
        }
        self.nodes[index].value
    }

    /// Cover-weighted mean leaf value, i.e. the tree's output with no features known.
    fn expected_value(&self, index: usize) -> f64 {
        let node = &self.nodes[index];
        match node.split {
            None => node.value,
            Some(split) => {
                let left = self.nodes[split.left].cover;
                let right = self.nodes[split.right].cover;
                (left * self.expected_value(split.left) + right * self.expected_value(split.right))
                    / (left + right)
            }
        }
    }

    fn shap_values(&self, row: &[f64], phi: &mut [f64]) {
        self.shap_recurse(row, phi, 0, &[], 1.0, 1.0, None);
    }

    #[allow(clippy::too_many_arguments)]
    fn shap_recurse(
        &self,
        row: &[f64],
        phi: &mut [f64],
        index: usize,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path.to_vec();
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        let node = &self.nodes[index];
        let Some(split) = node.split else {
            for position in 1..path.len() {
                let weight = unwound_path_sum(&path, position);
                let element = path[position];
                if let Some(feature) = element.feature {
                    phi[feature] +=
                        weight * (element.one_fraction - element.zero_fraction) * node.value;
                }
            }
            return;
        };

        let (hot, cold) = if row[split.feature] <= split.threshold {
            (split.left, split.right)
        } else {
            (split.right, split.left)
        };
        let total = self.nodes[split.left].cover + self.nodes[split.right].cover;
        let hot_zero_fraction = self.nodes[hot].cover / total;
        let cold_zero_fraction = self.nodes[cold].cover / total;

        let mut incoming_zero_fraction = 1.0;
        let mut incoming_one_fraction = 1.0;

        // A feature split on twice along one path is undone so this split can replace it.
        if let Some(position) = path
            .iter()
            .position(|element| element.feature == Some(split.feature))
        {
            incoming_zero_fraction = path[position].zero_fraction;
            incoming_one_fraction = path[position].one_fraction;
            unwind_path(&mut path, position);
        }

        self.shap_recurse(
            row,
            phi,
            hot,
            &path,
            hot_zero_fraction * incoming_zero_fraction,
            incoming_one_fraction,
            Some(split.feature),
        );
        self.shap_recurse(
            row,
            phi,
            cold,
            &path,
            cold_zero_fraction * incoming_zero_fraction,
            0.0,
            Some(split.feature),
        );
    }
}

/// Element of the unique feature path tracked by TreeSHAP.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, position: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[position].one_fraction;
    let zero_fraction = path[position].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let previous = path[i].weight;
            path[i].weight = next_one_portion * scale / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                previous - path[i].weight * zero_fraction * (depth - i) as f64 / scale;
        } else {
            path[i].weight = path[i].weight * scale / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in position..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `position` removed.
fn unwound_path_sum(path: &[PathElement], position: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[position].one_fraction;
    let zero_fraction = path[position].zero_fraction;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let portion = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += portion;
            next_one_portion = path[i].weight - portion * zero_fraction * (depth - i) as f64;
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].weight / (zero_fraction * (depth - i) as f64);
        }
    }

    total * (depth + 1) as f64
}

/// A fitted tree ensemble as exported for inference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeEnsemble {
    model_type: String,
    n_features: usize,
    #[serde(default)]
    objective: TreeObjective,
    #[serde(default)]
    base_score: f64,
    trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    pub fn new(
        model_type: impl Into<String>,
        n_features: usize,
        objective: TreeObjective,
        base_score: f64,
        trees: Vec<DecisionTree>,
    ) -> Result<Self, TreeError> {
        let ensemble = Self {
            model_type: model_type.into(),
            n_features,
            objective,
            base_score,
            trees,
        };
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn validate(&self) -> Result<(), TreeError> {
        if self.trees.is_empty() {
            return Err(TreeError::Empty);
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(index, tree)| tree.validate(index, self.n_features))
    }

    pub fn objective(&self) -> TreeObjective {
        self.objective
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn combine(&self, total: f64) -> f64 {
        match self.objective {
            TreeObjective::LogisticMargin => self.base_score + total,
            TreeObjective::AveragedProbability => {
                self.base_score + total / self.trees.len() as f64
            }
        }
    }

    /// Ensemble output before the link: a margin or an averaged probability.
    pub fn raw_output(&self, row: &[f64]) -> f64 {
        self.combine(self.trees.iter().map(|tree| tree.leaf_value(row)).sum())
    }

    pub fn expected_output(&self) -> f64 {
        self.combine(self.trees.iter().map(|tree| tree.expected_value(0)).sum())
    }
}

impl Classifier for TreeEnsemble {
    fn declared_type(&self) -> &str {
        &self.model_type
    }

    fn input_width(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> [f64; 2] {
        let positive = match self.objective {
            TreeObjective::LogisticMargin => sigmoid(self.raw_output(row)),
            TreeObjective::AveragedProbability => self.raw_output(row).clamp(0.0, 1.0),
        };
        [1.0 - positive, positive]
    }
}

/// Exact TreeSHAP attributions in the ensemble's raw output space.
pub struct TreeExplainer {
    ensemble: Arc<TreeEnsemble>,
}

impl TreeExplainer {
    pub fn new(ensemble: Arc<TreeEnsemble>) -> Self {
        Self { ensemble }
    }
}

impl Explainer for TreeExplainer {
    fn explain(&self, row: &[f64]) -> RawExplanation {
        let ensemble = &self.ensemble;
        let mut phi = vec![0.0; ensemble.n_features];
        for tree in &ensemble.trees {
            tree.shap_values(row, &mut phi);
        }
        let base_value = ensemble.expected_output();

        match ensemble.objective {
            TreeObjective::LogisticMargin => RawExplanation {
                values: ClassOutput::Single(phi),
                base_value: ClassOutput::Single(base_value),
            },
            TreeObjective::AveragedProbability => {
                let scale = ensemble.trees.len() as f64;
                let positive: Vec<f64> = phi.iter().map(|value| value / scale).collect();
                let negative: Vec<f64> = positive.iter().map(|value| -value).collect();
                RawExplanation {
                    values: ClassOutput::PerClass(vec![negative, positive]),
                    base_value: ClassOutput::PerClass(vec![1.0 - base_value, base_value]),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_split() -> TreeEnsemble {
        TreeEnsemble::new(
            "XGBClassifier",
            2,
            TreeObjective::LogisticMargin,
            0.0,
            vec![DecisionTree::new(vec![
                TreeNode::split(1, 0.5, 1, 2, 1000.0),
                TreeNode::leaf(-0.3, 600.0),
                TreeNode::leaf(0.35, 400.0),
            ])],
        )
        .expect("valid ensemble")
    }

    fn single_values(explanation: RawExplanation) -> (Vec<f64>, f64) {
        match (explanation.values, explanation.base_value) {
            (ClassOutput::Single(values), ClassOutput::Single(base)) => (values, base),
            other => panic!("expected single output, got {other:?}"),
        }
    }

    #[test]
    fn single_split_attribution_is_leaf_minus_expectation() {
        let ensemble = Arc::new(single_split());
        let explainer = TreeExplainer::new(ensemble.clone());

        let (values, base) = single_values(explainer.explain(&[7.0, 1.0]));

        assert!((base - (-0.04)).abs() < 1e-9);
        assert!((values[1] - 0.39).abs() < 1e-9);
        assert_eq!(values[0], 0.0);
    }

    #[test]
    fn attributions_sum_to_margin_with_repeated_features() {
        let ensemble = Arc::new(
            TreeEnsemble::new(
                "GradientBoostingClassifier",
                3,
                TreeObjective::LogisticMargin,
                -1.2,
                vec![
                    DecisionTree::new(vec![
                        TreeNode::split(0, 10.0, 1, 2, 100.0),
                        TreeNode::split(0, 5.0, 3, 4, 70.0),
                        TreeNode::split(2, 0.5, 5, 6, 30.0),
                        TreeNode::leaf(-0.5, 40.0),
                        TreeNode::leaf(0.1, 30.0),
                        TreeNode::leaf(0.4, 10.0),
                        TreeNode::leaf(0.9, 20.0),
                    ]),
                    DecisionTree::new(vec![
                        TreeNode::split(1, 2.0, 1, 2, 100.0),
                        TreeNode::leaf(-0.2, 55.0),
                        TreeNode::split(2, 0.5, 3, 4, 45.0),
                        TreeNode::leaf(0.05, 15.0),
                        TreeNode::leaf(0.6, 30.0),
                    ]),
                ],
            )
            .expect("valid ensemble"),
        );
        let explainer = TreeExplainer::new(ensemble.clone());

        for row in [[3.0, 1.0, 0.0], [7.0, 4.0, 1.0], [12.0, 0.0, 1.0]] {
            let (values, base) = single_values(explainer.explain(&row));
            let reconstructed = base + values.iter().sum::<f64>();
            assert!(
                (reconstructed - ensemble.raw_output(&row)).abs() < 1e-9,
                "local accuracy failed for {row:?}"
            );
        }
    }

    #[test]
    fn averaged_probability_reports_per_class_attributions() {
        let ensemble = Arc::new(
            TreeEnsemble::new(
                "RandomForestClassifier",
                1,
                TreeObjective::AveragedProbability,
                0.0,
                vec![
                    DecisionTree::new(vec![
                        TreeNode::split(0, 0.5, 1, 2, 10.0),
                        TreeNode::leaf(0.1, 5.0),
                        TreeNode::leaf(0.5, 5.0),
                    ]),
                    DecisionTree::new(vec![
                        TreeNode::split(0, 0.5, 1, 2, 10.0),
                        TreeNode::leaf(0.0, 8.0),
                        TreeNode::leaf(0.4, 2.0),
                    ]),
                ],
            )
            .expect("valid ensemble"),
        );
        let explainer = TreeExplainer::new(ensemble.clone());
        let row = [1.0];

        let explanation = explainer.explain(&row);
        let ClassOutput::PerClass(values) = explanation.values else {
            panic!("expected per-class values");
        };
        let ClassOutput::PerClass(bases) = explanation.base_value else {
            panic!("expected per-class base values");
        };

        let positive = bases[1] + values[1].iter().sum::<f64>();
        assert!((positive - ensemble.predict_proba(&row)[1]).abs() < 1e-12);
        assert_eq!(values[0][0], -values[1][0]);
    }

    #[test]
    fn rejects_backward_child_links() {
        let result = TreeEnsemble::new(
            "XGBClassifier",
            1,
            TreeObjective::LogisticMargin,
            0.0,
            vec![DecisionTree::new(vec![
                TreeNode::split(0, 0.5, 1, 0, 10.0),
                TreeNode::leaf(0.1, 5.0),
            ])],
        );

        assert!(matches!(result, Err(TreeError::InvalidNode { node: 0, .. })));
    }

    #[test]
    fn rejects_split_on_feature_outside_width() {
        let result = TreeEnsemble::new(
            "XGBClassifier",
            1,
            TreeObjective::LogisticMargin,
            0.0,
            vec![DecisionTree::new(vec![
                TreeNode::split(4, 0.5, 1, 2, 10.0),
                TreeNode::leaf(0.1, 5.0),
                TreeNode::leaf(0.2, 5.0),
            ])],
        );

        assert!(matches!(result, Err(TreeError::InvalidNode { .. })));
        assert!(matches!(
            TreeEnsemble::new("XGBClassifier", 1, TreeObjective::LogisticMargin, 0.0, vec![]),
            Err(TreeError::Empty)
        ));
    }
}
