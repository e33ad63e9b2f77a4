//! Error types for Connection Triage.
//!
//! Every failure in the scoring and hypothesis pipeline maps to one variant of
//! [`Error`]. Each variant carries:
//! - a stable numeric code for machine parsing
//! - a category for grouping
//! - a client/internal classification that selects the HTTP status
//! - a remediation hint for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Invalid IPv4 Address
//!   Reason: invalid IPv4 address 'not-an-ip': expected 4 dot-separated octets, found 1
//!   Fix: Supply a dotted-decimal IPv4 address such as 10.0.0.1.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 10,
//!   "category": "input",
//!   "message": "invalid IPv4 address 'not-an-ip': expected 4 dot-separated octets, found 1",
//!   "client_fault": true,
//!   "remediation": "Supply a dotted-decimal IPv4 address such as 10.0.0.1.",
//!   "context": { "input": "not-an-ip" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Connection Triage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed caller input (addresses, labels, parameters).
    Input,
    /// Population partitioning produced an unusable split.
    Partition,
    /// Model or encoder artifacts.
    Artifact,
    /// Feature validation and model inference.
    Scoring,
    /// Connection dataset parsing.
    Dataset,
    /// Service configuration.
    Config,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Partition => write!(f, "partition"),
            ErrorCategory::Artifact => write!(f, "artifact"),
            ErrorCategory::Scoring => write!(f, "scoring"),
            ErrorCategory::Dataset => write!(f, "dataset"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Connection Triage.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("invalid IPv4 address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("unknown {field} category '{label}'")]
    UnknownCategory { field: String, label: String },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    // Partition errors (20-29)
    #[error("partition produced an empty {group} group")]
    EmptyGroup { group: String },

    // Artifact errors (30-39)
    #[error("{kind} artifact not found at {}", path.display())]
    ArtifactMissing { kind: String, path: PathBuf },

    #[error("invalid {kind} artifact at {}: {reason}", path.display())]
    Artifact {
        kind: String,
        path: PathBuf,
        reason: String,
    },

    #[error("invalid {field} vocabulary: {reason}")]
    Vocabulary { field: String, reason: String },

    // Scoring errors (40-49)
    #[error("non-finite {feature} in feature row {row} (zero-duration connection)")]
    DivisionEdgeCase { row: usize, feature: String },

    #[error("model error: {0}")]
    Model(String),

    // Dataset errors (50-59)
    #[error("dataset line {line}: {message}")]
    Dataset { line: usize, message: String },

    // Configuration errors (60-69)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (70-79)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failure in a row of the loaded dataset. Code and remediation follow
    /// `source`; the fault is always the service's, never the caller's.
    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the index of the batch row that produced it.
    pub fn at_row(row: usize, source: Error) -> Self {
        Error::Row {
            row,
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping any row wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Row { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Codes are stable and grouped by category:
    /// - 10-19: Input errors
    /// - 20-29: Partition errors
    /// - 30-39: Artifact errors
    /// - 40-49: Scoring errors
    /// - 50-59: Dataset errors
    /// - 60-69: Configuration errors
    /// - 70-79: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidAddress { .. } => 10,
            Error::UnknownCategory { .. } => 11,
            Error::InvalidParameter { .. } => 12,
            Error::EmptyGroup { .. } => 20,
            Error::ArtifactMissing { .. } => 30,
            Error::Artifact { .. } => 31,
            Error::Vocabulary { .. } => 32,
            Error::DivisionEdgeCase { .. } => 40,
            Error::Model(_) => 41,
            Error::Dataset { .. } => 50,
            Error::Config(_) => 60,
            Error::Io(_) => 70,
            Error::Json(_) => 71,
            Error::Row { source, .. } => source.code(),
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAddress { .. }
            | Error::UnknownCategory { .. }
            | Error::InvalidParameter { .. } => ErrorCategory::Input,

            Error::EmptyGroup { .. } => ErrorCategory::Partition,

            Error::ArtifactMissing { .. } | Error::Artifact { .. } | Error::Vocabulary { .. } => {
                ErrorCategory::Artifact
            }

            Error::DivisionEdgeCase { .. } | Error::Model(_) => ErrorCategory::Scoring,

            Error::Dataset { .. } => ErrorCategory::Dataset,

            Error::Config(_) => ErrorCategory::Config,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::Row { .. } => ErrorCategory::Dataset,
        }
    }

    /// True when the caller's input caused the failure (HTTP 400).
    ///
    /// Row-wrapped errors come from server-side data and are never client
    /// faults, whatever their root.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Error::InvalidAddress { .. }
                | Error::UnknownCategory { .. }
                | Error::InvalidParameter { .. }
                | Error::EmptyGroup { .. }
        )
    }

    /// True when the service cannot start with this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.root(),
            Error::ArtifactMissing { .. }
                | Error::Artifact { .. }
                | Error::Vocabulary { .. }
                | Error::Config(_)
        )
    }

    /// HTTP status used when this error terminates a request.
    pub fn http_status(&self) -> u16 {
        if self.is_client_fault() {
            400
        } else {
            500
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidAddress { .. } => {
                "Supply a dotted-decimal IPv4 address such as 10.0.0.1."
            }
            Error::UnknownCategory { .. } => {
                "Use a label present in the fitted encoder, or refit encoders with 'ct-core fit-encoders'."
            }
            Error::InvalidParameter { .. } => {
                "Check the parameter value against 'ct-core --help' or the endpoint documentation."
            }
            Error::EmptyGroup { .. } => {
                "Choose a threshold or protocol that leaves records on both sides of the split."
            }
            Error::ArtifactMissing { .. } => {
                "Check the [artifacts] paths in the configuration, or run 'ct-core check'."
            }
            Error::Artifact { .. } => {
                "Regenerate the artifact; its contents do not match the expected schema or feature layout."
            }
            Error::Vocabulary { .. } => {
                "Refit the encoders with 'ct-core fit-encoders --dataset <csv> --out-dir <dir>'."
            }
            Error::DivisionEdgeCase { .. } => {
                "The dataset contains a zero-duration connection; filter or repair it before scoring."
            }
            Error::Model(_) => {
                "The model artifact is inconsistent with the feature layout. Regenerate it."
            }
            Error::Dataset { .. } => {
                "Fix the reported CSV line. Headers must use Zeek conn.log column names."
            }
            Error::Config(_) => {
                "Run 'ct-core check' to validate configuration, or check syntax in the TOML file."
            }
            Error::Io(_) => "Check file paths and permissions, then retry.",
            Error::Json(_) => "Invalid JSON in artifact. Check syntax with 'jq . <file>'.",
            Error::Row { source, .. } => source.remediation(),
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::InvalidAddress { .. } => "Invalid IPv4 Address",
            Error::UnknownCategory { .. } => "Unknown Category",
            Error::InvalidParameter { .. } => "Invalid Parameter",
            Error::EmptyGroup { .. } => "Empty Comparison Group",
            Error::ArtifactMissing { .. } => "Artifact Missing",
            Error::Artifact { .. } => "Invalid Artifact",
            Error::Vocabulary { .. } => "Invalid Vocabulary",
            Error::DivisionEdgeCase { .. } => "Zero-Duration Edge Case",
            Error::Model(_) => "Model Error",
            Error::Dataset { .. } => "Dataset Parse Error",
            Error::Config(_) => "Configuration Error",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::Row { source, .. } => source.headline(),
        }
    }
}

/// Structured error body for JSON output and HTTP error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the caller's input caused the error.
    pub client_fault: bool,

    /// Remediation hint.
    pub remediation: String,

    /// Additional structured context (e.g., row, input, path).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

fn collect_context(err: &Error, context: &mut HashMap<String, serde_json::Value>) {
    match err {
        Error::InvalidAddress { input, .. } => {
            context.insert("input".to_string(), serde_json::json!(input));
        }
        Error::UnknownCategory { field, label } => {
            context.insert("field".to_string(), serde_json::json!(field));
            context.insert("label".to_string(), serde_json::json!(label));
        }
        Error::InvalidParameter { name, .. } => {
            context.insert("parameter".to_string(), serde_json::json!(name));
        }
        Error::EmptyGroup { group } => {
            context.insert("group".to_string(), serde_json::json!(group));
        }
        Error::ArtifactMissing { kind, path } | Error::Artifact { kind, path, .. } => {
            context.insert("artifact".to_string(), serde_json::json!(kind));
            context.insert("path".to_string(), serde_json::json!(path.display().to_string()));
        }
        Error::DivisionEdgeCase { row, feature } => {
            context.insert("row".to_string(), serde_json::json!(row));
            context.insert("feature".to_string(), serde_json::json!(feature));
        }
        Error::Dataset { line, .. } => {
            context.insert("line".to_string(), serde_json::json!(line));
        }
        Error::Row { row, source } => {
            context.insert("row".to_string(), serde_json::json!(row));
            collect_context(source, context);
        }
        _ => {}
    }
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();
        collect_context(err, &mut context);

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            client_fault: err.is_client_fault(),
            remediation: err.remediation().to_string(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
