//! Service configuration loading and validation.
//!
//! This module handles:
//! - Parsing `config.toml` into [`ServiceConfig`]
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Semantic validation (ranges, vocabulary membership)
//! - Config snapshot generation for the provenance report

use crate::encode::ConnState;
use crate::hypothesis::{TestOptions, VarianceAssumption, DEFAULT_ALPHA, DEFAULT_TARGET_POWER};
use crate::record::PredictDefaults;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CT_CONFIG";

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "conn_triage";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Largest `limit` accepted by the top-responder ranking.
pub const MAX_TOP_LIMIT: usize = 1000;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Semantic validation failed: {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<ConfigError> for ct_common::Error {
    fn from(err: ConfigError) -> Self {
        ct_common::Error::Config(err.to_string())
    }
}

/// Locations of the startup artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub protocol_encoder: PathBuf,
    pub conn_state_encoder: PathBuf,
    pub dataset: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from("./data/model.json"),
            protocol_encoder: PathBuf::from("./data/proto_encoder.json"),
            conn_state_encoder: PathBuf::from("./data/conn_state_encoder.json"),
            dataset: PathBuf::from("./data/conn.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            workers: 4,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub alpha: f64,
    pub target_power: f64,
    pub variance: VarianceAssumption,
    pub top_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            target_power: DEFAULT_TARGET_POWER,
            variance: VarianceAssumption::Welch,
            top_limit: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn test_options(&self) -> TestOptions {
        TestOptions {
            alpha: self.alpha,
            target_power: self.target_power,
            variance: self.variance,
        }
    }
}

/// Everything `config.toml` can set. Missing sections take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub artifacts: ArtifactPaths,
    pub server: ServerConfig,
    pub analysis: AnalysisConfig,
    pub predict_defaults: PredictDefaults,
}

impl ServiceConfig {
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let artifacts = [
            ("artifacts.model", &self.artifacts.model),
            ("artifacts.protocol_encoder", &self.artifacts.protocol_encoder),
            ("artifacts.conn_state_encoder", &self.artifacts.conn_state_encoder),
            ("artifacts.dataset", &self.artifacts.dataset),
        ];
        for (field, path) in artifacts {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::invalid(field, "path is empty"));
            }
        }

        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::invalid("server.bind", "address is empty"));
        }
        if self.server.workers == 0 || self.server.workers > 256 {
            return Err(ConfigError::invalid(
                "server.workers",
                format!("must be in 1..=256, got {}", self.server.workers),
            ));
        }

        self.analysis
            .test_options()
            .validate()
            .map_err(|e| ConfigError::invalid("analysis", e.to_string()))?;
        if self.analysis.top_limit == 0 || self.analysis.top_limit > MAX_TOP_LIMIT {
            return Err(ConfigError::invalid(
                "analysis.top_limit",
                format!("must be in 1..={MAX_TOP_LIMIT}, got {}", self.analysis.top_limit),
            ));
        }

        let defaults = &self.predict_defaults;
        if !defaults.duration.is_finite() || defaults.duration <= 0.0 {
            return Err(ConfigError::invalid(
                "predict_defaults.duration",
                format!("must be a positive number, got {}", defaults.duration),
            ));
        }
        if defaults.proto.trim().is_empty() {
            return Err(ConfigError::invalid("predict_defaults.proto", "protocol is empty"));
        }
        defaults
            .conn_state
            .parse::<ConnState>()
            .map_err(|e| ConfigError::invalid("predict_defaults.conn_state", e.to_string()))?;
        crate::encode::ip::encode(&defaults.id_orig_h)
            .map_err(|e| ConfigError::invalid("predict_defaults.id_orig_h", e.to_string()))?;
        Ok(())
    }
}

/// Where the resolved config came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Flag,
    Env,
    Xdg,
    Defaults,
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ServiceConfig,
    /// Path to the config file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 of the config file content (None if using defaults).
    pub hash: Option<String>,
    pub source: ConfigSource,
}

impl ResolvedConfig {
    pub fn defaults() -> Self {
        Self {
            config: ServiceConfig::default(),
            path: None,
            hash: None,
            source: ConfigSource::Defaults,
        }
    }

    /// Create a config snapshot for the provenance report.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            path: self.path.clone(),
            hash: self.hash.clone(),
            source: self.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub path: Option<PathBuf>,
    pub hash: Option<String>,
    pub source: ConfigSource,
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit `--config` path
/// 2. `CT_CONFIG`
/// 3. `$XDG_CONFIG_HOME/conn_triage/config.toml`
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(options: &ConfigOptions, lookup: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (path, source) = match resolve_config_path(options, &lookup) {
        Some(found) => found,
        None => {
            let resolved = ResolvedConfig::defaults();
            resolved.config.validate()?;
            return Ok(resolved);
        }
    };

    // The XDG file is optional; explicit paths must exist.
    if source == ConfigSource::Xdg && !path.exists() {
        let resolved = ResolvedConfig::defaults();
        resolved.config.validate()?;
        return Ok(resolved);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: path.clone() }
        } else {
            ConfigError::IoError {
                path: path.clone(),
                source: e,
            }
        }
    })?;

    let config = ServiceConfig::from_toml(&content, &path)?;
    config.validate()?;

    tracing::debug!(
        event = crate::logging::event_names::CONFIG_RESOLVED,
        path = %path.display(),
        ?source,
        "config resolved"
    );

    Ok(ResolvedConfig {
        config,
        hash: Some(compute_hash(content.as_bytes())),
        path: Some(path),
        source,
    })
}

fn resolve_config_path<F>(options: &ConfigOptions, lookup: &F) -> Option<(PathBuf, ConfigSource)>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = &options.config_path {
        return Some((path.clone(), ConfigSource::Flag));
    }

    if let Some(path) = lookup(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some((PathBuf::from(path), ConfigSource::Env));
    }

    let xdg_config = lookup("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    Some((
        xdg_config.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        ConfigSource::Xdg,
    ))
}

/// SHA-256 of `bytes`, lowercase hex.
pub fn compute_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
