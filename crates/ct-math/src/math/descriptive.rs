//! Descriptive statistics over score samples.
//!
//! Variance uses Welford's single-pass update and the unbiased (n - 1)
//! denominator, so a one-element sample has NaN variance.

use serde::{Deserialize, Serialize};

/// Count, mean, and sample variance of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub count: usize,
    pub mean: f64,
    /// Unbiased sample variance; NaN when `count < 2`.
    pub variance: f64,
}

impl SampleSummary {
    /// Summarize `values` in one pass.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut count = 0usize;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        for &x in values {
            count += 1;
            let delta = x - mean;
            mean += delta / count as f64;
            m2 += delta * (x - mean);
        }
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                variance: f64::NAN,
            };
        }
        let variance = if count < 2 {
            f64::NAN
        } else {
            m2 / (count - 1) as f64
        };
        Self {
            count,
            mean,
            variance,
        }
    }

    /// Sample standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Squared standard error of the mean, `variance / count`.
    pub fn sem_squared(&self) -> f64 {
        self.variance / self.count as f64
    }
}

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    SampleSummary::from_slice(values).mean
}

/// Unbiased sample variance; NaN for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    SampleSummary::from_slice(values).variance
}

/// Unbiased sample standard deviation.
pub fn sample_std(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Median; the mean of the two middle values for even lengths.
///
/// NaN entries sort last, matching `f64::total_cmp`. Returns NaN for an
/// empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}
