//! Subgroup analyses over one scored snapshot of the dataset.
//!
//! Every analysis scores the full dataset once, partitions that snapshot,
//! and hands both groups plus the whole population to the hypothesis
//! engine. Reports serialize to the HTTP response bodies.

use crate::context::AppContext;
use crate::encode::VocabularyTable;
use crate::features::{FeatureMatrix, FeatureVectorBuilder};
use crate::hypothesis::{
    Decision, Direction, HypothesisTestEngine, HypothesisTestResult, VarianceAssumption,
};
use crate::model::ScoringModel;
use crate::partition::{partition, Partition, Strategy};
use crate::record::ConnectionRecord;
use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Protocols the membership analysis accepts.
pub const TESTABLE_PROTOCOLS: [&str; 2] = ["tcp", "udp"];

/// Feature matrix and scores of one scoring pass, row-aligned.
#[derive(Debug, Clone)]
pub struct ScoredPopulation {
    pub matrix: FeatureMatrix,
    pub scores: Vec<f64>,
}

impl ScoredPopulation {
    pub fn score(
        records: &[ConnectionRecord],
        vocab: &VocabularyTable,
        model: &dyn ScoringModel,
    ) -> Result<Self> {
        let matrix = FeatureVectorBuilder::new(vocab).build_many(records)?;
        let scores = model.score(&matrix)?;
        Ok(Self { matrix, scores })
    }

    fn split(&self, strategy: &Strategy) -> Result<(Partition, Vec<f64>, Vec<f64>)> {
        let groups = partition(&self.matrix, strategy)?;
        let (a, b) = groups.split_scores(&self.scores);
        Ok((groups, a, b))
    }
}

/// Statistics common to every comparison report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    pub effect_size: f64,
    pub power: f64,
    pub required_sample_size: Option<f64>,
    pub alpha: f64,
    pub variance: VarianceAssumption,
    pub significant: bool,
}

impl From<&HypothesisTestResult> for TestSummary {
    fn from(r: &HypothesisTestResult) -> Self {
        Self {
            t_statistic: r.t_statistic,
            p_value: r.p_value,
            degrees_of_freedom: r.degrees_of_freedom,
            effect_size: r.effect_size,
            power: r.power,
            required_sample_size: r.required_sample_size,
            alpha: r.alpha,
            variance: r.variance,
            significant: r.decision.is_significant(),
        }
    }
}

/// Long vs short duration connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationReport {
    pub threshold_duration: f64,
    pub mean_long_duration_likelihood: f64,
    pub mean_short_duration_likelihood: f64,
    pub long_count: usize,
    pub short_count: usize,
    #[serde(flatten)]
    pub test: TestSummary,
    pub result: String,
}

/// One protocol vs every other protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolReport {
    pub protocol: String,
    pub mean_protocol_likelihood: f64,
    pub mean_other_protocol_likelihood: f64,
    pub protocol_count: usize,
    pub other_count: usize,
    #[serde(flatten)]
    pub test: TestSummary,
    pub result: String,
}

/// TCP rows vs UDP rows, everything else excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpUdpReport {
    pub mean_tcp_likelihood: f64,
    pub mean_udp_likelihood: f64,
    pub tcp_count: usize,
    pub udp_count: usize,
    pub excluded_count: usize,
    #[serde(flatten)]
    pub test: TestSummary,
    pub result: String,
}

fn duration_result(decision: &Decision) -> String {
    if decision.is_significant() {
        "Alternative hypothesis supported: There is a significant difference in malicious likelihood between long and short duration connections."
            .to_string()
    } else {
        "Null hypothesis supported: There is no significant difference in malicious likelihood between long and short duration connections."
            .to_string()
    }
}

fn comparison_result(subject: &str, other: &str, decision: &Decision) -> String {
    match decision.direction() {
        Some(Direction::Greater) => {
            format!("{subject} is significantly more likely to be malicious than {other}.")
        }
        Some(Direction::Less) => {
            format!("{subject} is significantly less likely to be malicious than {other}.")
        }
        None => format!("{subject} is not significantly more likely to be malicious than {other}."),
    }
}

/// Compare connections longer than `threshold` with the rest.
///
/// Without a threshold the dataset's median duration is used.
pub fn duration_analysis(
    ctx: &AppContext,
    threshold: Option<f64>,
    variance: Option<VarianceAssumption>,
) -> Result<DurationReport> {
    let threshold = threshold.unwrap_or_else(|| ctx.dataset().median_duration());
    if !threshold.is_finite() {
        return Err(Error::InvalidParameter {
            name: "threshold".to_string(),
            reason: format!("must be a finite number, got {threshold}"),
        });
    }
    let engine = HypothesisTestEngine::new(ctx.test_options(variance))?;

    let population = ctx.score_population()?;
    let (_, long, short) = population.split(&Strategy::DurationThreshold { threshold })?;
    let outcome = engine.run(&long, &short, &population.scores)?;

    Ok(DurationReport {
        threshold_duration: threshold,
        mean_long_duration_likelihood: outcome.group_a_mean,
        mean_short_duration_likelihood: outcome.group_b_mean,
        long_count: outcome.group_a_size,
        short_count: outcome.group_b_size,
        test: TestSummary::from(&outcome),
        result: duration_result(&outcome.decision),
    })
}

/// Compare `protocol` (tcp or udp) against every other protocol.
pub fn protocol_analysis(
    ctx: &AppContext,
    protocol: &str,
    variance: Option<VarianceAssumption>,
) -> Result<ProtocolReport> {
    if !TESTABLE_PROTOCOLS.contains(&protocol) {
        return Err(Error::InvalidParameter {
            name: "protocol".to_string(),
            reason: format!("Invalid protocol '{protocol}'. Please choose either 'udp' or 'tcp'."),
        });
    }
    let code = ctx.vocab().protocol.encode(protocol)?;
    let engine = HypothesisTestEngine::new(ctx.test_options(variance))?;

    let population = ctx.score_population()?;
    let strategy = Strategy::ProtocolMembership {
        label: protocol.to_string(),
        code,
    };
    let (_, target, others) = population.split(&strategy)?;
    let outcome = engine.run(&target, &others, &population.scores)?;

    Ok(ProtocolReport {
        protocol: protocol.to_string(),
        mean_protocol_likelihood: outcome.group_a_mean,
        mean_other_protocol_likelihood: outcome.group_b_mean,
        protocol_count: outcome.group_a_size,
        other_count: outcome.group_b_size,
        test: TestSummary::from(&outcome),
        result: comparison_result(&protocol.to_uppercase(), "other protocols", &outcome.decision),
    })
}

/// Compare TCP rows with UDP rows only.
pub fn tcp_udp_analysis(ctx: &AppContext, variance: Option<VarianceAssumption>) -> Result<TcpUdpReport> {
    let code_a = ctx.vocab().protocol.encode("tcp")?;
    let code_b = ctx.vocab().protocol.encode("udp")?;
    let engine = HypothesisTestEngine::new(ctx.test_options(variance))?;

    let population = ctx.score_population()?;
    let strategy = Strategy::ProtocolPair {
        label_a: "tcp".to_string(),
        code_a,
        label_b: "udp".to_string(),
        code_b,
    };
    let (groups, tcp, udp) = population.split(&strategy)?;
    let outcome = engine.run(&tcp, &udp, &population.scores)?;

    Ok(TcpUdpReport {
        mean_tcp_likelihood: outcome.group_a_mean,
        mean_udp_likelihood: outcome.group_b_mean,
        tcp_count: outcome.group_a_size,
        udp_count: outcome.group_b_size,
        excluded_count: groups.excluded,
        test: TestSummary::from(&outcome),
        result: comparison_result("TCP", "UDP", &outcome.decision),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{context, scored};

    fn duration_fixture() -> AppContext {
        context(vec![
            scored("10.0.0.1", "tcp", 1.0, 0.1),
            scored("10.0.0.2", "tcp", 2.0, 0.1),
            scored("10.0.0.3", "tcp", 3.0, 0.9),
            scored("10.0.0.4", "tcp", 10.0, 0.9),
        ])
    }

    #[test]
    fn duration_partition_counts() {
        let ctx = duration_fixture();
        let report = duration_analysis(&ctx, Some(3.0), None).unwrap();
        assert_eq!((report.long_count, report.short_count), (1, 3));
        assert!((report.mean_long_duration_likelihood - 0.9).abs() < 1e-9);
        assert!(report.test.p_value.is_nan());
        assert!(report.result.starts_with("Null hypothesis supported"));

        let report = duration_analysis(&ctx, Some(2.5), None).unwrap();
        assert_eq!((report.long_count, report.short_count), (2, 2));
    }

    #[test]
    fn duration_defaults_to_median() {
        let ctx = duration_fixture();
        let report = duration_analysis(&ctx, None, None).unwrap();
        assert_eq!(report.threshold_duration, 2.5);
    }

    #[test]
    fn duration_significant_wording() {
        let mut records = Vec::new();
        for i in 0..30 {
            let jitter = f64::from(i % 5) * 0.01;
            records.push(scored("10.0.0.1", "tcp", 100.0, 0.85 + jitter));
            records.push(scored("10.0.0.2", "tcp", 1.0, 0.10 + jitter));
        }
        let report = duration_analysis(&context(records), Some(50.0), None).unwrap();
        assert!(report.test.significant);
        assert!(report.result.starts_with("Alternative hypothesis supported"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["long_count"], 30);
        assert!(json["t_statistic"].as_f64().unwrap() > 0.0);
        assert_eq!(json["variance"], "welch");
    }

    #[test]
    fn duration_empty_group() {
        let err = duration_analysis(&duration_fixture(), Some(100.0), None).unwrap_err();
        assert!(matches!(err, Error::EmptyGroup { ref group } if group == "long"));
        assert_eq!(err.http_status(), 400);
    }

    fn protocol_fixture() -> Vec<ConnectionRecord> {
        vec![
            scored("10.0.0.1", "tcp", 1.0, 0.2),
            scored("10.0.0.2", "tcp", 1.0, 0.3),
            scored("10.0.0.3", "tcp", 1.0, 0.4),
            scored("10.0.0.4", "udp", 1.0, 0.6),
            scored("10.0.0.5", "udp", 1.0, 0.8),
        ]
    }

    #[test]
    fn protocol_group_sizes() {
        let report = protocol_analysis(&context(protocol_fixture()), "udp", None).unwrap();
        assert_eq!((report.protocol_count, report.other_count), (2, 3));
        assert!((report.mean_protocol_likelihood - 0.7).abs() < 1e-9);
        assert!((report.mean_other_protocol_likelihood - 0.3).abs() < 1e-9);
        assert!(report.result.starts_with("UDP is"));
    }

    #[test]
    fn protocol_without_rows_is_empty_group() {
        let tcp_only: Vec<_> = protocol_fixture()
            .into_iter()
            .filter(|r| r.protocol == "tcp")
            .collect();
        let err = protocol_analysis(&context(tcp_only), "udp", None).unwrap_err();
        assert!(matches!(err, Error::EmptyGroup { ref group } if group == "udp"));
    }

    #[test]
    fn protocol_outside_allowed_set() {
        let err = protocol_analysis(&context(protocol_fixture()), "icmp", None).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn comparison_wording() {
        let greater = Decision::RejectNull {
            direction: Direction::Greater,
        };
        let less = Decision::RejectNull {
            direction: Direction::Less,
        };
        assert_eq!(
            comparison_result("TCP", "other protocols", &greater),
            "TCP is significantly more likely to be malicious than other protocols."
        );
        assert_eq!(
            comparison_result("UDP", "other protocols", &less),
            "UDP is significantly less likely to be malicious than other protocols."
        );
        assert_eq!(
            comparison_result("UDP", "other protocols", &Decision::FailToReject),
            "UDP is not significantly more likely to be malicious than other protocols."
        );
    }

    #[test]
    fn tcp_udp_excludes_other_protocols() {
        let mut records = protocol_fixture();
        records.push(scored("10.0.0.6", "icmp", 1.0, 0.99));
        let report = tcp_udp_analysis(&context(records), Some(VarianceAssumption::Pooled)).unwrap();
        assert_eq!((report.tcp_count, report.udp_count, report.excluded_count), (3, 2, 1));
        assert_eq!(report.test.variance, VarianceAssumption::Pooled);
        assert!((report.test.degrees_of_freedom - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_duration_row_fails_scoring() {
        let mut records = protocol_fixture();
        records.push(scored("10.0.0.9", "tcp", 0.0, 0.5));
        let err = protocol_analysis(&context(records), "tcp", None).unwrap_err();
        assert!(matches!(err, Error::DivisionEdgeCase { row: 5, .. }));
        assert_eq!(err.http_status(), 500);
    }
}
