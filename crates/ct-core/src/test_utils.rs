//! Shared fixtures for unit tests.

use crate::context::AppContext;
use crate::dataset::Dataset;
use crate::encode::{CategoricalEncoder, ConnState, VocabularyTable};
use crate::features::FeatureVector;
use crate::model::ScoringModel;
use crate::record::ConnectionRecord;
use std::sync::Arc;

/// A record with fixed origin, port 80, and 100/100 bytes.
pub fn record(responder_host: &str, protocol: &str, duration: f64, state: &str) -> ConnectionRecord {
    ConnectionRecord {
        origin_host: "192.168.1.1".to_string(),
        origin_port: 12345,
        responder_host: responder_host.to_string(),
        responder_port: 80,
        protocol: protocol.to_string(),
        duration_seconds: duration,
        origin_bytes: 100,
        responder_bytes: 100,
        connection_state: state.to_string(),
        label: None,
    }
}

/// A record whose [`FixedScoreModel`] score is `score` (resolution 1e-6).
pub fn scored(responder_host: &str, protocol: &str, duration: f64, score: f64) -> ConnectionRecord {
    let mut rec = record(responder_host, protocol, duration, "SF");
    rec.origin_bytes = (score * SCORE_SCALE).round() as u64;
    rec
}

/// tcp = 0, udp = 1, icmp = 2; connection states in declared order.
pub fn vocab() -> VocabularyTable {
    VocabularyTable {
        protocol: CategoricalEncoder::protocol(vec![
            "tcp".to_string(),
            "udp".to_string(),
            "icmp".to_string(),
        ])
        .unwrap(),
        conn_state: CategoricalEncoder::conn_state(
            ConnState::ALL.iter().map(|s| s.as_str().to_string()).collect(),
        )
        .unwrap(),
    }
}

const SCORE_SCALE: f64 = 1_000_000.0;

/// Scores a row as `orig_bytes / 1e6`, so fixtures choose their own scores.
#[derive(Debug)]
pub struct FixedScoreModel;

impl ScoringModel for FixedScoreModel {
    fn kind(&self) -> &'static str {
        "fixed-score"
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        features.values()[6] / SCORE_SCALE
    }
}

/// An in-memory context over `records` with default config.
pub fn context(records: Vec<ConnectionRecord>) -> AppContext {
    AppContext::from_parts(
        Default::default(),
        vocab(),
        Arc::new(FixedScoreModel),
        Dataset::new(records),
    )
}
