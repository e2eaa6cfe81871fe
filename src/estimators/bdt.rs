//! Boosted-decision-tree disp estimator.
//!
//! Prediction is `base + shrinkage · Σ tree(x)`. An optional second forest
//! predicts the absolute error of the first and is reported as the
//! uncertainty.

use serde::{Deserialize, Serialize};

use super::{DispEstimator, DispFeatures, DispPrediction, EstimatorKind, Feature, feature_vector};

/// Tree node; `feature` indexes the model's input list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root; `x[feature] < threshold` goes left.
    fn predict(&self, x: &[f64]) -> Option<f64> {
        let mut idx = 0usize;
        // A well-formed tree never visits more nodes than it has.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx)? {
                Node::Leaf { value } => return Some(*value),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = *x.get(*feature)?;
                    idx = if v < *threshold { *left } else { *right };
                }
            }
        }
        None
    }

    fn is_well_formed(&self, n_features: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().all(|n| match n {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && threshold.is_finite()
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
                Node::Leaf { value } => value.is_finite(),
            })
    }
}

fn default_shrinkage() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    #[serde(default)]
    pub base: f64,
    #[serde(default = "default_shrinkage")]
    pub shrinkage: f64,
    pub trees: Vec<Tree>,
}

impl Forest {
    fn predict(&self, x: &[f64]) -> Option<f64> {
        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict(x)?;
        }
        Some(self.base + self.shrinkage * sum)
    }

    fn is_well_formed(&self, n_features: usize) -> bool {
        !self.trees.is_empty()
            && self.shrinkage.is_finite()
            && self.trees.iter().all(|t| t.is_well_formed(n_features))
    }
}

/// On-disk BDT model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BdtModel {
    #[serde(default = "super::default_true")]
    pub valid: bool,
    #[serde(default = "Feature::default_inputs")]
    pub inputs: Vec<Feature>,
    pub disp: Forest,
    #[serde(default)]
    pub error: Option<Forest>,
}

#[derive(Debug, Clone)]
pub struct BdtEstimator {
    model: BdtModel,
    valid: bool,
}

impl BdtEstimator {
    pub fn from_model(model: BdtModel) -> Self {
        let n = model.inputs.len();
        let valid = model.valid
            && model.disp.is_well_formed(n)
            && model.error.as_ref().is_none_or(|f| f.is_well_formed(n));
        Self { model, valid }
    }
}

impl DispEstimator for BdtEstimator {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Bdt
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn evaluate(&self, features: &DispFeatures) -> Option<DispPrediction> {
        if !self.valid {
            return None;
        }
        let x = feature_vector(&self.model.inputs, features);
        let disp = self.model.disp.predict(&x)?;
        let uncertainty = match &self.model.error {
            Some(forest) => forest.predict(&x).map(f64::abs),
            None => None,
        };
        DispPrediction::checked(disp, uncertainty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::tests::sample_features;

    fn stump(threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split { feature: 0, threshold, left: 1, right: 2 },
                Node::Leaf { value: low },
                Node::Leaf { value: high },
            ],
        }
    }

    fn model() -> BdtModel {
        BdtModel {
            valid: true,
            inputs: vec![Feature::Length],
            disp: Forest {
                base: 0.2,
                shrinkage: 0.5,
                trees: vec![stump(0.25, 0.0, 1.0), stump(0.5, 0.4, 2.0)],
            },
            error: Some(Forest {
                base: 0.0,
                shrinkage: 1.0,
                trees: vec![Tree { nodes: vec![Node::Leaf { value: -0.1 }] }],
            }),
        }
    }

    #[test]
    fn forest_sums_trees() {
        let est = BdtEstimator::from_model(model());
        assert!(est.is_valid());
        // length 0.3: first stump -> 1.0, second -> 0.4
        let p = est.evaluate(&sample_features()).unwrap();
        assert!((p.disp - (0.2 + 0.5 * 1.4)).abs() < 1e-12);
        assert_eq!(p.uncertainty, Some(0.1));
    }

    #[test]
    fn dangling_child_marks_invalid() {
        let mut m = model();
        m.disp.trees[0].nodes[0] = Node::Split { feature: 0, threshold: 0.1, left: 7, right: 2 };
        assert!(!BdtEstimator::from_model(m).is_valid());
    }

    #[test]
    fn cyclic_tree_does_not_hang() {
        let tree = Tree {
            nodes: vec![Node::Split { feature: 0, threshold: 1.0, left: 0, right: 0 }],
        };
        assert_eq!(tree.predict(&[0.5]), None);
    }

    #[test]
    fn parses_json_model() {
        let json = r#"{
            "inputs": ["length", "log_size"],
            "disp": {"trees": [{"nodes": [
                {"feature": 1, "threshold": 2.5, "left": 1, "right": 2},
                {"value": 0.3},
                {"value": 0.9}
            ]}]}
        }"#;
        let m: BdtModel = serde_json::from_str(json).unwrap();
        let est = BdtEstimator::from_model(m);
        let p = est.evaluate(&sample_features()).unwrap();
        assert!((p.disp - 0.9).abs() < 1e-12);
        assert_eq!(p.uncertainty, None);
    }
}
