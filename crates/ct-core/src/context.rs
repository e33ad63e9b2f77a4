//! Immutable application context shared by every request.
//!
//! Artifacts and the dataset are read once at startup. A missing or
//! inconsistent artifact is fatal here, before any request is served.

use crate::analysis::ScoredPopulation;
use crate::config::{compute_hash, ConfigSnapshot, ResolvedConfig, ServiceConfig};
use crate::dataset::{load_dataset, Dataset};
use crate::encode::{ip, VocabularyTable};
use crate::features::{layout_fingerprint, FeatureMatrix, FeatureVectorBuilder};
use crate::hypothesis::{TestOptions, VarianceAssumption};
use crate::logging::event_names;
use crate::model::{load_model, ScoringModel};
use chrono::{DateTime, Utc};
use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Where an artifact came from and what it hashed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactProvenance {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

impl ArtifactProvenance {
    pub fn of(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256: compute_hash(&content),
            bytes: content.len() as u64,
        })
    }
}

/// Startup snapshot reported by `/health` and `ct-core check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub loaded_at: DateTime<Utc>,
    pub model_kind: String,
    pub feature_layout: String,
    pub records: usize,
    pub protocol_classes: Vec<String>,
    pub model: Option<ArtifactProvenance>,
    pub protocol_encoder: Option<ArtifactProvenance>,
    pub conn_state_encoder: Option<ArtifactProvenance>,
    pub dataset: Option<ArtifactProvenance>,
    pub config: Option<ConfigSnapshot>,
}

/// Score for a single responder host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id_resp_h: String,
    pub malicious_likelihood: f64,
}

/// Encoders, model, dataset, and config for the process lifetime.
#[derive(Debug)]
pub struct AppContext {
    config: ServiceConfig,
    vocab: VocabularyTable,
    model: Arc<dyn ScoringModel>,
    dataset: Dataset,
    provenance: Provenance,
}

impl AppContext {
    /// Load every artifact named by `resolved`.
    pub fn load(resolved: &ResolvedConfig) -> Result<Self> {
        let config = resolved.config.clone();
        let paths = &config.artifacts;

        let model = load_model(&paths.model)?;
        let model_prov = loaded(&paths.model, "model")?;

        let vocab = VocabularyTable::load(&paths.protocol_encoder, &paths.conn_state_encoder)?;
        let proto_prov = loaded(&paths.protocol_encoder, "protocol_encoder")?;
        let state_prov = loaded(&paths.conn_state_encoder, "conn_state_encoder")?;

        let dataset = load_dataset(&paths.dataset)?;
        let dataset_prov = ArtifactProvenance::of(&paths.dataset)?;
        info!(
            event = event_names::DATASET_LOADED,
            path = %paths.dataset.display(),
            sha256 = %dataset_prov.sha256,
            records = dataset.len(),
            "dataset loaded"
        );

        let mut ctx = Self::from_parts(config, vocab, model, dataset);
        ctx.provenance.model = Some(model_prov);
        ctx.provenance.protocol_encoder = Some(proto_prov);
        ctx.provenance.conn_state_encoder = Some(state_prov);
        ctx.provenance.dataset = Some(dataset_prov);
        ctx.provenance.config = Some(resolved.snapshot());
        Ok(ctx)
    }

    /// Assemble a context from already-loaded parts.
    pub fn from_parts(
        config: ServiceConfig,
        vocab: VocabularyTable,
        model: Arc<dyn ScoringModel>,
        dataset: Dataset,
    ) -> Self {
        let provenance = Provenance {
            loaded_at: Utc::now(),
            model_kind: model.kind().to_string(),
            feature_layout: layout_fingerprint(),
            records: dataset.len(),
            protocol_classes: vocab.protocol.classes().to_vec(),
            model: None,
            protocol_encoder: None,
            conn_state_encoder: None,
            dataset: None,
            config: None,
        };
        Self {
            config,
            vocab,
            model,
            dataset,
            provenance,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn vocab(&self) -> &VocabularyTable {
        &self.vocab
    }

    pub fn model(&self) -> &dyn ScoringModel {
        self.model.as_ref()
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Configured test options, with an optional per-call variance override.
    pub fn test_options(&self, variance: Option<VarianceAssumption>) -> TestOptions {
        let options = self.config.analysis.test_options();
        match variance {
            Some(v) => options.with_variance(v),
            None => options,
        }
    }

    /// Score one connection to `ip`, every other field from the configured defaults.
    pub fn predict(&self, ip: &str) -> Result<Prediction> {
        ip::encode(ip)?;
        let record = self.config.predict_defaults.record_for(ip);
        let vector = FeatureVectorBuilder::new(&self.vocab).build(&record)?;
        let scores = self.model.score(&FeatureMatrix::new(vec![vector]))?;
        let malicious_likelihood = scores
            .first()
            .copied()
            .ok_or_else(|| Error::Model("no score returned for a single-row batch".to_string()))?;
        Ok(Prediction {
            id_resp_h: ip.to_string(),
            malicious_likelihood,
        })
    }

    /// Build and score the whole dataset in one pass.
    pub fn score_population(&self) -> Result<ScoredPopulation> {
        ScoredPopulation::score(self.dataset.records(), &self.vocab, self.model.as_ref())
    }
}

fn loaded(path: &Path, kind: &str) -> Result<ArtifactProvenance> {
    let prov = ArtifactProvenance::of(path)?;
    info!(
        event = event_names::ARTIFACT_LOADED,
        artifact = kind,
        path = %path.display(),
        sha256 = %prov.sha256,
        "artifact loaded"
    );
    Ok(prov)
}
