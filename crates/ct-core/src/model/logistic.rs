//! Logistic regression adapter.

use super::ScoringModel;
use crate::features::{FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// `p = sigmoid(intercept + Σ wᵢ·xᵢ)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LogisticRegression {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {} coefficients, found {}",
                FEATURE_COUNT,
                self.coefficients.len()
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|w| !w.is_finite()) {
            return Err("coefficients must be finite".to_string());
        }
        Ok(())
    }
}

/// Logistic function without overflow for large |z|.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl ScoringModel for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        let z = features
            .values()
            .iter()
            .zip(&self.coefficients)
            .fold(self.intercept, |acc, (x, w)| acc + w * x);
        sigmoid(z)
    }
}
