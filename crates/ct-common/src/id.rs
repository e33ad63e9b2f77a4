//! Record and request identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a connection record within the loaded dataset.
///
/// Scores, partitions, and per-row errors all refer to records by this
/// index, so it is stable for the lifetime of a loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub usize);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for RecordId {
    fn from(index: usize) -> Self {
        RecordId(index)
    }
}

/// Request ID attached to every HTTP request span.
///
/// Format: `req-XXXXXXXXXXXX` (first 12 hex digits of a v4 UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn new() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        RequestId(format!("req-{}", &simple[..12]))
    }

    /// Parse an existing request ID string.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix("req-")?;
        if hex.len() != 12 || !hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return None;
        }
        Some(RequestId(s.to_string()))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
