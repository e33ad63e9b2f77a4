//! Closed-vocabulary categorical encoders.
//!
//! An encoder is a fixed bidirectional table between labels and dense codes
//! `0..n`. Codes follow the order the vocabulary was declared in. Labels
//! outside the table are rejected; the table never grows after construction.

use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Field name of the protocol encoder.
pub const PROTOCOL_FIELD: &str = "proto";
/// Field name of the connection-state encoder.
pub const CONN_STATE_FIELD: &str = "conn_state";
/// Protocol that every protocol vocabulary must contain.
pub const REQUIRED_PROTOCOL: &str = "tcp";
/// Encoder artifact schema version written by this build.
pub const ENCODER_SCHEMA_VERSION: &str = "1.0.0";

/// Zeek connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnState {
    S0,
    S1,
    SF,
    REJ,
    S2,
    S3,
    RSTO,
    RSTR,
    RSTOS0,
    RSTRH,
    SH,
    SHR,
    OTH,
}

impl ConnState {
    /// All states in canonical declaration order.
    pub const ALL: [ConnState; 13] = [
        ConnState::S0,
        ConnState::S1,
        ConnState::SF,
        ConnState::REJ,
        ConnState::S2,
        ConnState::S3,
        ConnState::RSTO,
        ConnState::RSTR,
        ConnState::RSTOS0,
        ConnState::RSTRH,
        ConnState::SH,
        ConnState::SHR,
        ConnState::OTH,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnState::S0 => "S0",
            ConnState::S1 => "S1",
            ConnState::SF => "SF",
            ConnState::REJ => "REJ",
            ConnState::S2 => "S2",
            ConnState::S3 => "S3",
            ConnState::RSTO => "RSTO",
            ConnState::RSTR => "RSTR",
            ConnState::RSTOS0 => "RSTOS0",
            ConnState::RSTRH => "RSTRH",
            ConnState::SH => "SH",
            ConnState::SHR => "SHR",
            ConnState::OTH => "OTH",
        }
    }
}

impl FromStr for ConnState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ConnState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| Error::UnknownCategory {
                field: CONN_STATE_FIELD.to_string(),
                label: s.to_string(),
            })
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bidirectional label/code table over a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalEncoder {
    field: String,
    classes: Vec<String>,
    codes: HashMap<String, u32>,
}

impl CategoricalEncoder {
    /// Build an encoder; codes follow the order of `classes`.
    pub fn new(field: impl Into<String>, classes: Vec<String>) -> Result<Self> {
        let field = field.into();
        let vocab_err = |reason: String| Error::Vocabulary {
            field: field.clone(),
            reason,
        };

        if classes.is_empty() {
            return Err(vocab_err("vocabulary is empty".to_string()));
        }
        if classes.len() > u32::MAX as usize {
            return Err(vocab_err("vocabulary is too large".to_string()));
        }

        let mut codes = HashMap::with_capacity(classes.len());
        for (code, label) in classes.iter().enumerate() {
            if label.is_empty() {
                return Err(vocab_err(format!("label at position {code} is empty")));
            }
            if codes.insert(label.clone(), code as u32).is_some() {
                return Err(vocab_err(format!("duplicate label '{label}'")));
            }
        }

        Ok(Self {
            field,
            classes,
            codes,
        })
    }

    /// Protocol encoder; the vocabulary must contain `tcp`.
    pub fn protocol(classes: Vec<String>) -> Result<Self> {
        let encoder = Self::new(PROTOCOL_FIELD, classes)?;
        if !encoder.contains(REQUIRED_PROTOCOL) {
            return Err(Error::Vocabulary {
                field: PROTOCOL_FIELD.to_string(),
                reason: format!("'{REQUIRED_PROTOCOL}' is missing"),
            });
        }
        Ok(encoder)
    }

    /// Connection-state encoder; the vocabulary must be exactly the 13 Zeek states.
    pub fn conn_state(classes: Vec<String>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for label in &classes {
            let state = label.parse::<ConnState>().map_err(|_| Error::Vocabulary {
                field: CONN_STATE_FIELD.to_string(),
                reason: format!("'{label}' is not a connection state"),
            })?;
            seen.insert(state);
        }
        let encoder = Self::new(CONN_STATE_FIELD, classes)?;
        if let Some(missing) = ConnState::ALL.iter().find(|s| !seen.contains(s)) {
            return Err(Error::Vocabulary {
                field: CONN_STATE_FIELD.to_string(),
                reason: format!("state '{missing}' is missing"),
            });
        }
        Ok(encoder)
    }

    /// Fit a protocol encoder from observed labels.
    ///
    /// Classes are the distinct observed labels plus `tcp`, in sorted order.
    pub fn fit_protocols<'a, I>(observed: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut distinct: BTreeSet<&str> = observed.into_iter().collect();
        distinct.insert(REQUIRED_PROTOCOL);
        Self::protocol(distinct.into_iter().map(str::to_string).collect())
    }

    /// Connection-state encoder over all 13 states, in sorted order.
    pub fn fit_conn_states() -> Result<Self> {
        let mut classes: Vec<String> = ConnState::ALL.iter().map(|s| s.to_string()).collect();
        classes.sort();
        Self::conn_state(classes)
    }

    pub fn encode(&self, label: &str) -> Result<u32> {
        self.codes
            .get(label)
            .copied()
            .ok_or_else(|| Error::UnknownCategory {
                field: self.field.clone(),
                label: label.to_string(),
            })
    }

    pub fn decode(&self, code: u32) -> Result<&str> {
        self.classes
            .get(code as usize)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownCategory {
                field: self.field.clone(),
                label: format!("code {code}"),
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.codes.contains_key(label)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn to_artifact(&self) -> EncoderArtifact {
        EncoderArtifact {
            schema_version: ENCODER_SCHEMA_VERSION.to_string(),
            field: self.field.clone(),
            classes: self.classes.clone(),
        }
    }
}

/// On-disk form of a fitted encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub schema_version: String,
    pub field: String,
    pub classes: Vec<String>,
}

impl EncoderArtifact {
    /// Read an encoder artifact, expecting it to describe `field`.
    pub fn load(path: &Path, field: &str) -> Result<Self> {
        let kind = format!("{field} encoder");
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ArtifactMissing {
                    kind,
                    path: path.to_path_buf(),
                })
            }
            Err(err) => return Err(Error::Io(err)),
        };
        let artifact_err = |reason: String| Error::Artifact {
            kind: kind.clone(),
            path: path.to_path_buf(),
            reason,
        };

        let artifact: EncoderArtifact =
            serde_json::from_str(&content).map_err(|e| artifact_err(e.to_string()))?;
        if !artifact.schema_version.starts_with("1.") {
            return Err(artifact_err(format!(
                "unsupported schema_version '{}'",
                artifact.schema_version
            )));
        }
        if artifact.field != field {
            return Err(artifact_err(format!(
                "artifact describes field '{}'",
                artifact.field
            )));
        }
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}
