//! Feature vector construction.
//!
//! A [`FeatureVector`] is built from one [`ConnectionRecord`] by encoding
//! both hosts, both categorical fields, and deriving `byte_rate`. A zero
//! duration yields a non-finite `byte_rate`; the builder keeps it as-is and
//! scoring rejects it.

pub mod layout;

pub use layout::{layout_fingerprint, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT};

use crate::encode::{ip, VocabularyTable};
use crate::record::ConnectionRecord;
use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// One row of model input, in [`FEATURE_LAYOUT`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    pub fn protocol_code(&self) -> u32 {
        self.0[layout::IDX_PROTOCOL] as u32
    }

    pub fn duration(&self) -> f64 {
        self.0[layout::IDX_DURATION]
    }

    pub fn byte_rate(&self) -> f64 {
        self.0[layout::IDX_BYTE_RATE]
    }

    /// Index of the first NaN or infinite entry.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.0.iter().position(|v| !v.is_finite())
    }
}

/// Ordered batch of feature vectors; row `i` came from input record `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<FeatureVector>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<FeatureVector>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fail on the first row holding a non-finite value.
    pub fn ensure_finite(&self) -> Result<()> {
        for (row, vector) in self.rows.iter().enumerate() {
            if let Some(index) = vector.first_non_finite() {
                return Err(Error::DivisionEdgeCase {
                    row,
                    feature: FEATURE_LAYOUT[index].to_string(),
                });
            }
        }
        Ok(())
    }
}

impl From<Vec<FeatureVector>> for FeatureMatrix {
    fn from(rows: Vec<FeatureVector>) -> Self {
        Self::new(rows)
    }
}

/// Builds feature vectors against a fixed pair of encoders.
#[derive(Debug, Clone, Copy)]
pub struct FeatureVectorBuilder<'a> {
    vocab: &'a VocabularyTable,
}

impl<'a> FeatureVectorBuilder<'a> {
    pub fn new(vocab: &'a VocabularyTable) -> Self {
        Self { vocab }
    }

    /// Build one vector; fails on the first invalid field.
    pub fn build(&self, record: &ConnectionRecord) -> Result<FeatureVector> {
        let origin_host = ip::encode(&record.origin_host)?;
        let responder_host = ip::encode(&record.responder_host)?;
        let protocol = self.vocab.protocol.encode(&record.protocol)?;
        let conn_state = self.vocab.conn_state.encode(&record.connection_state)?;

        let origin_bytes = record.origin_bytes as f64;
        let responder_bytes = record.responder_bytes as f64;
        let byte_rate = (origin_bytes + responder_bytes) / record.duration_seconds;

        Ok(FeatureVector([
            f64::from(origin_host),
            f64::from(record.origin_port),
            f64::from(responder_host),
            f64::from(record.responder_port),
            f64::from(protocol),
            record.duration_seconds,
            origin_bytes,
            responder_bytes,
            f64::from(conn_state),
            byte_rate,
        ]))
    }

    /// Build every vector in input order. The first bad row fails the batch.
    pub fn build_many(&self, records: &[ConnectionRecord]) -> Result<FeatureMatrix> {
        records
            .iter()
            .enumerate()
            .map(|(row, record)| self.build(record).map_err(|e| Error::at_row(row, e)))
            .collect::<Result<Vec<_>>>()
            .map(FeatureMatrix::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{record, vocab};
    use proptest::prelude::*;

    #[test]
    fn build_follows_layout() {
        let vocab = vocab();
        let builder = FeatureVectorBuilder::new(&vocab);
        let mut rec = record("10.0.0.2", "udp", 4.0, "S0");
        rec.origin_bytes = 300;
        rec.responder_bytes = 100;
        let v = builder.build(&rec).unwrap();

        assert_eq!(v.0[0], 3_232_235_777.0); // 192.168.1.1
        assert_eq!(v.0[2], 167_772_162.0); // 10.0.0.2
        assert_eq!(v.protocol_code(), vocab.protocol.encode("udp").unwrap());
        assert_eq!(v.duration(), 4.0);
        assert_eq!(v.0[8], f64::from(vocab.conn_state.encode("S0").unwrap()));
        assert_eq!(v.byte_rate(), 100.0);
        assert!(v.first_non_finite().is_none());
    }

    #[test]
    fn zero_duration_is_non_finite_not_masked() {
        let vocab = vocab();
        let builder = FeatureVectorBuilder::new(&vocab);
        let v = builder.build(&record("10.0.0.2", "tcp", 0.0, "SF")).unwrap();
        assert!(v.byte_rate().is_infinite());
        assert_eq!(v.first_non_finite(), Some(layout::IDX_BYTE_RATE));

        let mut silent = record("10.0.0.2", "tcp", 0.0, "SF");
        silent.origin_bytes = 0;
        silent.responder_bytes = 0;
        assert!(builder.build(&silent).unwrap().byte_rate().is_nan());

        let matrix = FeatureMatrix::new(vec![v]);
        assert!(matches!(
            matrix.ensure_finite(),
            Err(Error::DivisionEdgeCase { row: 0, ref feature }) if feature == "byte_rate"
        ));
    }

    #[test]
    fn first_sub_error_wins() {
        let vocab = vocab();
        let builder = FeatureVectorBuilder::new(&vocab);
        let mut rec = record("bad", "sctp", 1.0, "SF");
        assert!(matches!(builder.build(&rec), Err(Error::InvalidAddress { .. })));
        rec.responder_host = "10.0.0.1".into();
        assert!(matches!(builder.build(&rec), Err(Error::UnknownCategory { .. })));
        rec.protocol = "tcp".into();
        rec.connection_state = "ZZ".into();
        assert!(matches!(
            builder.build(&rec),
            Err(Error::UnknownCategory { ref field, .. }) if field == "conn_state"
        ));
    }

    #[test]
    fn build_many_preserves_order_and_reports_row() {
        let vocab = vocab();
        let builder = FeatureVectorBuilder::new(&vocab);
        let records = vec![
            record("10.0.0.1", "tcp", 1.0, "SF"),
            record("10.0.0.2", "udp", 2.0, "SF"),
            record("10.0.0.3", "tcp", 3.0, "SF"),
        ];
        let matrix = builder.build_many(&records).unwrap();
        let durations: Vec<f64> = matrix.rows().iter().map(|v| v.duration()).collect();
        assert_eq!(durations, vec![1.0, 2.0, 3.0]);

        let mut bad = records.clone();
        bad[1].responder_host = "10.0.0.256".into();
        let err = builder.build_many(&bad).unwrap_err();
        assert!(matches!(err, Error::Row { row: 1, .. }));
        assert!(!err.is_client_fault());
    }

    proptest! {
        #[test]
        fn byte_rate_is_exact(orig in 0u64..1_000_000_000, resp in 0u64..1_000_000_000, duration in 0.0f64..1.0e6) {
            let vocab = vocab();
            let builder = FeatureVectorBuilder::new(&vocab);
            let mut rec = record("10.0.0.1", "tcp", duration, "SF");
            rec.origin_bytes = orig;
            rec.responder_bytes = resp;
            let v = builder.build(&rec).unwrap();
            let expected = (orig as f64 + resp as f64) / duration;
            if duration == 0.0 {
                prop_assert!(!v.byte_rate().is_finite());
            } else {
                prop_assert_eq!(v.byte_rate(), expected);
            }
        }
    }
}
