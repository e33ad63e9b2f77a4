//! Two-sample hypothesis testing over malicious-likelihood scores.
//!
//! The engine compares group A against group B with an independent
//! two-sample t-test, then reports the standardized effect size, achieved
//! power, and the group-A size needed to reach the target power at the
//! observed size ratio. All statistics come from the score slices passed in,
//! so callers must derive both groups and the population from one scoring
//! pass.

pub mod power;

pub use power::{required_nobs1, ttest_ind_power};

use ct_common::{Error, Result};
use ct_math::{sample_std, student_t_two_sided, SampleSummary};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALPHA: f64 = 0.05;
pub const DEFAULT_TARGET_POWER: f64 = 0.80;

/// Variance assumption for the t-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarianceAssumption {
    /// Unequal variances, Welch–Satterthwaite degrees of freedom.
    #[default]
    Welch,
    /// Equal variances, pooled estimate, `n_a + n_b - 2` degrees of freedom.
    Pooled,
}

impl std::str::FromStr for VarianceAssumption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "welch" | "unequal" => Ok(VarianceAssumption::Welch),
            "pooled" | "equal" | "student" => Ok(VarianceAssumption::Pooled),
            _ => Err(Error::InvalidParameter {
                name: "variance".to_string(),
                reason: format!("expected 'welch' or 'pooled', got '{s}'"),
            }),
        }
    }
}

impl std::fmt::Display for VarianceAssumption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarianceAssumption::Welch => write!(f, "welch"),
            VarianceAssumption::Pooled => write!(f, "pooled"),
        }
    }
}

/// Significance level, power target, and variance assumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestOptions {
    pub alpha: f64,
    pub target_power: f64,
    pub variance: VarianceAssumption,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            target_power: DEFAULT_TARGET_POWER,
            variance: VarianceAssumption::Welch,
        }
    }
}

impl TestOptions {
    pub fn with_variance(mut self, variance: VarianceAssumption) -> Self {
        self.variance = variance;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let open_unit = |v: f64| v > 0.0 && v < 1.0;
        if !open_unit(self.alpha) {
            return Err(Error::InvalidParameter {
                name: "alpha".to_string(),
                reason: format!("must lie in (0, 1), got {}", self.alpha),
            });
        }
        if !open_unit(self.target_power) || self.target_power <= self.alpha {
            return Err(Error::InvalidParameter {
                name: "target_power".to_string(),
                reason: format!(
                    "must lie in (alpha, 1) = ({}, 1), got {}",
                    self.alpha, self.target_power
                ),
            });
        }
        Ok(())
    }
}

/// Which way group A differs from group B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Greater,
    Less,
}

/// Outcome of the decision rule `p < alpha`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    RejectNull { direction: Direction },
    FailToReject,
}

impl Decision {
    pub fn is_significant(&self) -> bool {
        matches!(self, Decision::RejectNull { .. })
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Decision::RejectNull { direction } => Some(*direction),
            Decision::FailToReject => None,
        }
    }
}

/// Every statistic of one A-vs-B comparison.
///
/// Variance-dependent fields are NaN (serialized as `null`) when a group has
/// a single member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisTestResult {
    pub group_a_mean: f64,
    pub group_b_mean: f64,
    pub group_a_size: usize,
    pub group_b_size: usize,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub effect_size: f64,
    pub power: f64,
    /// Group-A size reaching `target_power`; group B scales by the observed ratio.
    pub required_sample_size: Option<f64>,
    pub alpha: f64,
    pub target_power: f64,
    pub variance: VarianceAssumption,
    pub decision: Decision,
}

/// t statistic and degrees of freedom for two summarized samples.
pub fn t_statistic(a: &SampleSummary, b: &SampleSummary, variance: VarianceAssumption) -> (f64, f64) {
    let na = a.count as f64;
    let nb = b.count as f64;
    let diff = a.mean - b.mean;
    match variance {
        VarianceAssumption::Welch => {
            let sa = a.sem_squared();
            let sb = b.sem_squared();
            let se2 = sa + sb;
            let df = se2 * se2 / (sa * sa / (na - 1.0) + sb * sb / (nb - 1.0));
            (diff / se2.sqrt(), df)
        }
        VarianceAssumption::Pooled => {
            let df = na + nb - 2.0;
            let pooled = ((na - 1.0) * a.variance + (nb - 1.0) * b.variance) / df;
            let se = (pooled * (1.0 / na + 1.0 / nb)).sqrt();
            (diff / se, df)
        }
    }
}

/// Two-sided p-value; an infinite t (zero spread, distinct means) gives 0.
pub fn two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_infinite() {
        return 0.0;
    }
    student_t_two_sided(t, df)
}

/// Runs the full comparison under fixed [`TestOptions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HypothesisTestEngine {
    options: TestOptions,
}

impl HypothesisTestEngine {
    pub fn new(options: TestOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &TestOptions {
        &self.options
    }

    /// Compare `group_a` with `group_b`. `population` is every score in the
    /// snapshot and supplies the effect-size normalizer.
    pub fn run(&self, group_a: &[f64], group_b: &[f64], population: &[f64]) -> Result<HypothesisTestResult> {
        if group_a.is_empty() {
            return Err(Error::EmptyGroup {
                group: "A".to_string(),
            });
        }
        if group_b.is_empty() {
            return Err(Error::EmptyGroup {
                group: "B".to_string(),
            });
        }

        let TestOptions {
            alpha,
            target_power,
            variance,
        } = self.options;

        let a = SampleSummary::from_slice(group_a);
        let b = SampleSummary::from_slice(group_b);
        let (t, df) = t_statistic(&a, &b, variance);
        let p = two_sided_p(t, df);

        let effect_size = (a.mean - b.mean) / sample_std(population);
        let ratio = b.count as f64 / a.count as f64;
        let power = ttest_ind_power(effect_size, a.count as f64, alpha, ratio);
        let required_sample_size = required_nobs1(effect_size, alpha, target_power, ratio);

        let decision = if p < alpha {
            Decision::RejectNull {
                direction: if t > 0.0 {
                    Direction::Greater
                } else {
                    Direction::Less
                },
            }
        } else {
            Decision::FailToReject
        };

        tracing::debug!(
            target: "ct_core::hypothesis",
            event = crate::logging::event_names::HYPOTHESIS_TESTED,
            n_a = a.count,
            n_b = b.count,
            t,
            p,
            effect_size,
            significant = decision.is_significant(),
            "hypothesis test complete"
        );

        Ok(HypothesisTestResult {
            group_a_mean: a.mean,
            group_b_mean: b.mean,
            group_a_size: a.count,
            group_b_size: b.count,
            t_statistic: t,
            degrees_of_freedom: df,
            p_value: p,
            effect_size,
            power,
            required_sample_size,
            alpha,
            target_power,
            variance,
            decision,
        })
    }
}
