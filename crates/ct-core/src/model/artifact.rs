//! JSON model artifacts.
//!
//! ```json
//! {
//!   "schema_version": "1.0.0",
//!   "feature_layout": "v1:id.orig_h,id.orig_p,...,byte_rate",
//!   "kind": "logistic_regression",
//!   "intercept": -1.2,
//!   "coefficients": [0.0, ...]
//! }
//! ```

use super::{LogisticRegression, RandomForest, ScoringModel};
use crate::features::layout_fingerprint;
use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const MODEL_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: String,
    /// Fingerprint of the feature layout the model was trained on.
    pub feature_layout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub model: ModelSpec,
}

impl ModelArtifact {
    pub fn new(model: ModelSpec) -> Self {
        Self {
            schema_version: MODEL_SCHEMA_VERSION.to_string(),
            feature_layout: layout_fingerprint(),
            description: None,
            model,
        }
    }

    /// Parse and validate an artifact. `reason` strings are reported verbatim.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let artifact: ModelArtifact = serde_json::from_str(content).map_err(|e| e.to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.schema_version.starts_with("1.") {
            return Err(format!(
                "unsupported schema_version '{}'",
                self.schema_version
            ));
        }
        let expected = layout_fingerprint();
        if self.feature_layout != expected {
            return Err(format!(
                "feature layout mismatch: artifact declares '{}', this build expects '{}'",
                self.feature_layout, expected
            ));
        }
        match &self.model {
            ModelSpec::LogisticRegression(m) => m.validate(),
            ModelSpec::RandomForest(m) => m.validate(),
        }
    }

    pub fn into_model(self) -> Arc<dyn ScoringModel> {
        match self.model {
            ModelSpec::LogisticRegression(m) => Arc::new(m),
            ModelSpec::RandomForest(m) => Arc::new(m),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

/// Load a model artifact from disk.
pub fn load_model(path: &Path) -> Result<Arc<dyn ScoringModel>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ArtifactMissing {
                kind: "model".to_string(),
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(Error::Io(err)),
    };
    let artifact = ModelArtifact::parse(&content).map_err(|reason| Error::Artifact {
        kind: "model".to_string(),
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(artifact.into_model())
}
