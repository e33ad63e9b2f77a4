//! Feature layout: the single definition of column order.
//!
//! Model artifacts declare the fingerprint of the layout they were trained
//! against. Changing a name or the order here changes the fingerprint, so
//! stale models are rejected at load time instead of scoring garbage.

use serde::{Deserialize, Serialize};

/// Bump when the layout changes.
pub const FEATURE_VERSION: u8 = 1;

/// Feature names in vector order.
pub const FEATURE_LAYOUT: [&str; FEATURE_COUNT] = [
    "id.orig_h",  // 0: origin host as integer
    "id.orig_p",  // 1
    "id.resp_h",  // 2: responder host as integer
    "id.resp_p",  // 3
    "proto",      // 4: protocol code
    "duration",   // 5: seconds
    "orig_bytes", // 6
    "resp_bytes", // 7
    "conn_state", // 8: connection-state code
    "byte_rate",  // 9: (orig_bytes + resp_bytes) / duration
];

pub const FEATURE_COUNT: usize = 10;

pub const IDX_RESP_HOST: usize = 2;
pub const IDX_PROTOCOL: usize = 4;
pub const IDX_DURATION: usize = 5;
pub const IDX_BYTE_RATE: usize = 9;

/// Layout fingerprint stored in model artifacts, e.g. `v1:id.orig_h,...,byte_rate`.
pub fn layout_fingerprint() -> String {
    format!("v{}:{}", FEATURE_VERSION, FEATURE_LAYOUT.join(","))
}

/// Layout description for `check` output and `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub feature_count: usize,
    pub fingerprint: String,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            feature_count: FEATURE_COUNT,
            fingerprint: layout_fingerprint(),
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}
