//! Scoring models.
//!
//! A [`ScoringModel`] is an already-fitted binary classifier. Adapters only
//! implement per-row prediction; [`ScoringModel::score`] wraps it with the
//! checks every adapter shares: non-finite input is rejected with
//! `DivisionEdgeCase`, and any output outside `[0, 1]` is a model error.

pub mod artifact;
pub mod forest;
pub mod logistic;

pub use artifact::{load_model, ModelArtifact, ModelSpec, MODEL_SCHEMA_VERSION};
pub use forest::{DecisionTree, RandomForest, TreeNode};
pub use logistic::{sigmoid, LogisticRegression};

use crate::features::{FeatureMatrix, FeatureVector};
use ct_common::{Error, Result};

/// Opaque binary classifier producing P(malicious) per row.
pub trait ScoringModel: Send + Sync + std::fmt::Debug {
    /// Artifact `kind` tag of this adapter.
    fn kind(&self) -> &'static str;

    /// Probability for one finite feature vector.
    fn predict(&self, features: &FeatureVector) -> f64;

    /// One probability per row, in row order.
    fn score(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        matrix.ensure_finite()?;
        matrix
            .rows()
            .iter()
            .enumerate()
            .map(|(row, features)| {
                let p = self.predict(features);
                if (0.0..=1.0).contains(&p) {
                    Ok(p)
                } else {
                    Err(Error::Model(format!(
                        "{} produced {p} for row {row}, outside [0, 1]",
                        self.kind()
                    )))
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;

    #[derive(Debug)]
    struct Constant(f64);

    impl ScoringModel for Constant {
        fn kind(&self) -> &'static str {
            "constant"
        }
        fn predict(&self, _: &FeatureVector) -> f64 {
            self.0
        }
    }

    fn matrix(rows: usize) -> FeatureMatrix {
        FeatureMatrix::new(vec![FeatureVector([1.0; FEATURE_COUNT]); rows])
    }

    #[test]
    fn score_returns_one_probability_per_row() {
        assert_eq!(Constant(0.25).score(&matrix(3)).unwrap(), vec![0.25; 3]);
        assert!(Constant(0.25).score(&matrix(0)).unwrap().is_empty());
    }

    #[test]
    fn score_rejects_out_of_range_output() {
        assert!(matches!(Constant(1.5).score(&matrix(1)), Err(Error::Model(_))));
        assert!(matches!(Constant(f64::NAN).score(&matrix(1)), Err(Error::Model(_))));
    }

    #[test]
    fn score_rejects_non_finite_input() {
        let mut rows = vec![FeatureVector([1.0; FEATURE_COUNT]); 3];
        rows[2].0[9] = f64::INFINITY;
        let err = Constant(0.5).score(&FeatureMatrix::new(rows)).unwrap_err();
        assert!(matches!(err, Error::DivisionEdgeCase { row: 2, .. }));
        assert_eq!(err.http_status(), 500);
    }
}
