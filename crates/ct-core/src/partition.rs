//! Population partitioning.
//!
//! Splits a scored feature matrix into two disjoint groups of row indices.
//! Threshold and membership splits are exhaustive over the matrix; the
//! strict pair split is exhaustive over rows carrying either code and counts
//! the rest as excluded.

use crate::features::FeatureMatrix;
use ct_common::{Error, RecordId, Result};
use serde::{Deserialize, Serialize};

/// How rows are assigned to groups A and B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// A = `duration > threshold`, B = `duration <= threshold`.
    DurationThreshold { threshold: f64 },
    /// A = rows whose protocol code equals `code`, B = all others.
    ProtocolMembership { label: String, code: u32 },
    /// A = rows with `code_a`, B = rows with `code_b`, others excluded.
    ProtocolPair {
        label_a: String,
        code_a: u32,
        label_b: String,
        code_b: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
    Excluded,
}

impl Strategy {
    /// Display names of groups A and B, used in `EmptyGroup` errors.
    pub fn group_names(&self) -> (String, String) {
        match self {
            Strategy::DurationThreshold { .. } => ("long".to_string(), "short".to_string()),
            Strategy::ProtocolMembership { label, .. } => (label.clone(), format!("non-{label}")),
            Strategy::ProtocolPair {
                label_a, label_b, ..
            } => (label_a.clone(), label_b.clone()),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Strategy::DurationThreshold { threshold } if threshold.is_nan() => {
                Err(Error::InvalidParameter {
                    name: "threshold".to_string(),
                    reason: "must be a number".to_string(),
                })
            }
            Strategy::ProtocolPair { code_a, code_b, .. } if code_a == code_b => {
                Err(Error::InvalidParameter {
                    name: "protocol".to_string(),
                    reason: "pair must name two different protocols".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn side(&self, duration: f64, protocol: u32) -> Side {
        match *self {
            Strategy::DurationThreshold { threshold } => {
                if duration > threshold {
                    Side::A
                } else {
                    Side::B
                }
            }
            Strategy::ProtocolMembership { code, .. } => {
                if protocol == code {
                    Side::A
                } else {
                    Side::B
                }
            }
            Strategy::ProtocolPair { code_a, code_b, .. } => {
                if protocol == code_a {
                    Side::A
                } else if protocol == code_b {
                    Side::B
                } else {
                    Side::Excluded
                }
            }
        }
    }
}

/// Row indices of each group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    pub group_a: Vec<RecordId>,
    pub group_b: Vec<RecordId>,
    /// Rows belonging to neither group (strict pair only).
    pub excluded: usize,
}

impl Partition {
    /// Gather the scores of each group, in row order.
    pub fn split_scores(&self, scores: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let pick = |ids: &[RecordId]| -> Vec<f64> {
            ids.iter().filter_map(|id| scores.get(id.0).copied()).collect()
        };
        (pick(&self.group_a), pick(&self.group_b))
    }
}

/// Partition `matrix` with `strategy`. Fails if either group is empty.
pub fn partition(matrix: &FeatureMatrix, strategy: &Strategy) -> Result<Partition> {
    strategy.validate()?;

    let mut group_a = Vec::new();
    let mut group_b = Vec::new();
    let mut excluded = 0usize;

    for (row, features) in matrix.rows().iter().enumerate() {
        match strategy.side(features.duration(), features.protocol_code()) {
            Side::A => group_a.push(RecordId(row)),
            Side::B => group_b.push(RecordId(row)),
            Side::Excluded => excluded += 1,
        }
    }

    let (name_a, name_b) = strategy.group_names();
    if group_a.is_empty() {
        return Err(Error::EmptyGroup { group: name_a });
    }
    if group_b.is_empty() {
        return Err(Error::EmptyGroup { group: name_b });
    }

    tracing::debug!(
        a = group_a.len(),
        b = group_b.len(),
        excluded,
        "partitioned population"
    );
    Ok(Partition {
        group_a,
        group_b,
        excluded,
    })
}
