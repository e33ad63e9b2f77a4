//! Random forest adapter.
//!
//! Trees are flat node arrays rooted at index 0. A split sends `x[feature] <=
//! threshold` left and everything else right; leaves hold P(malicious). The
//! forest averages its trees.

use super::ScoringModel;
use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        probability: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Children must point strictly forward, which rules out cycles and
    /// guarantees traversal terminates.
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!("node {index}: feature {feature} out of range"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {index}: threshold is NaN"));
                    }
                    for child in [left, right] {
                        if child <= index || child >= len {
                            return Err(format!("node {index}: child {child} does not point forward"));
                        }
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(&probability) {
                        return Err(format!("node {index}: leaf probability {probability} outside [0,1]"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf probability for `features`, or NaN when the walk leaves the
    /// tree. An unvalidated tree can never panic or loop here.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let x = features.values();
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(value) = x.get(*feature) else {
                        return f64::NAN;
                    };
                    let next = if *value <= *threshold { *left } else { *right };
                    if next <= index {
                        return f64::NAN;
                    }
                    index = next;
                }
                Some(TreeNode::Leaf { probability }) => return *probability,
                None => return f64::NAN,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

impl ScoringModel for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        sum / self.trees.len() as f64
    }
}
