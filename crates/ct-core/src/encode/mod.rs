//! Encoders that turn raw connection fields into numeric codes.
//!
//! - [`ip`]: dotted-decimal IPv4 <-> `u32`
//! - [`vocabulary`]: closed-vocabulary label encoders for protocol and
//!   connection state

pub mod ip;
pub mod vocabulary;

pub use vocabulary::{
    CategoricalEncoder, ConnState, EncoderArtifact, CONN_STATE_FIELD, PROTOCOL_FIELD,
};

use crate::record::ConnectionRecord;
use ct_common::Result;
use std::path::Path;

/// The two fitted encoders the feature builder needs.
#[derive(Debug, Clone)]
pub struct VocabularyTable {
    pub protocol: CategoricalEncoder,
    pub conn_state: CategoricalEncoder,
}

impl VocabularyTable {
    /// Load both encoders from their JSON artifacts.
    pub fn load(protocol_path: &Path, conn_state_path: &Path) -> Result<Self> {
        let protocol = EncoderArtifact::load(protocol_path, PROTOCOL_FIELD)?;
        let conn_state = EncoderArtifact::load(conn_state_path, CONN_STATE_FIELD)?;
        Ok(Self {
            protocol: CategoricalEncoder::protocol(protocol.classes)?,
            conn_state: CategoricalEncoder::conn_state(conn_state.classes)?,
        })
    }

    /// Fit both encoders from a dataset.
    pub fn fit(records: &[ConnectionRecord]) -> Result<Self> {
        Ok(Self {
            protocol: CategoricalEncoder::fit_protocols(records.iter().map(|r| r.protocol.as_str()))?,
            conn_state: CategoricalEncoder::fit_conn_states()?,
        })
    }

    /// Write both encoder artifacts.
    pub fn save(&self, protocol_path: &Path, conn_state_path: &Path) -> Result<()> {
        self.protocol.to_artifact().save(protocol_path)?;
        self.conn_state.to_artifact().save(conn_state_path)
    }
}
