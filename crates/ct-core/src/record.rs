//! Raw connection records.

use serde::{Deserialize, Serialize};

/// One Zeek `conn.log` observation, as read.
///
/// Hosts stay as strings; they are only validated when a feature vector is
/// built, so a bad address surfaces as `InvalidAddress` with its row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    #[serde(rename = "id.orig_h")]
    pub origin_host: String,
    #[serde(rename = "id.orig_p")]
    pub origin_port: u16,
    #[serde(rename = "id.resp_h")]
    pub responder_host: String,
    #[serde(rename = "id.resp_p")]
    pub responder_port: u16,
    #[serde(rename = "proto")]
    pub protocol: String,
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    #[serde(rename = "orig_bytes")]
    pub origin_bytes: u64,
    #[serde(rename = "resp_bytes")]
    pub responder_bytes: u64,
    #[serde(rename = "conn_state")]
    pub connection_state: String,
    /// Ground-truth label when the dataset carries one; never used for scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Field values used by `/predict` for everything but the responder host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictDefaults {
    pub id_resp_p: u16,
    pub id_orig_h: String,
    pub id_orig_p: u16,
    pub proto: String,
    pub duration: f64,
    pub orig_bytes: u64,
    pub resp_bytes: u64,
    pub conn_state: String,
}

impl Default for PredictDefaults {
    fn default() -> Self {
        Self {
            id_resp_p: 80,
            id_orig_h: "192.168.1.1".to_string(),
            id_orig_p: 12345,
            proto: "tcp".to_string(),
            duration: 1.0,
            orig_bytes: 100,
            resp_bytes: 100,
            conn_state: "SF".to_string(),
        }
    }
}

impl PredictDefaults {
    /// A record aimed at `responder_host` with every other field defaulted.
    pub fn record_for(&self, responder_host: &str) -> ConnectionRecord {
        ConnectionRecord {
            origin_host: self.id_orig_h.clone(),
            origin_port: self.id_orig_p,
            responder_host: responder_host.to_string(),
            responder_port: self.id_resp_p,
            protocol: self.proto.clone(),
            duration_seconds: self.duration,
            origin_bytes: self.orig_bytes,
            responder_bytes: self.resp_bytes,
            connection_state: self.conn_state.clone(),
            label: None,
        }
    }
}
