//! Structured logging for ct-core.
//!
//! - Human-readable console output for interactive use
//! - JSON lines for service deployments
//!
//! stdout is reserved for command payloads; all log output goes to stderr.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Stable event names used as the `event` field on structured log lines.
pub mod event_names {
    pub const ARTIFACT_LOADED: &str = "artifact.loaded";
    pub const DATASET_LOADED: &str = "dataset.loaded";
    pub const CONFIG_RESOLVED: &str = "config.resolved";
    pub const SERVER_STARTED: &str = "server.started";
    pub const SERVER_STOPPED: &str = "server.stopped";
    pub const REQUEST_COMPLETED: &str = "request.completed";
    pub const REQUEST_FAILED: &str = "request.failed";
    pub const HYPOTHESIS_TESTED: &str = "hypothesis.tested";
}

/// Initialize the logging subsystem.
///
/// Call once at startup. A second call is a no-op so tests that spin up
/// several servers in one process do not panic.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::new(format!(
        "ct_core={level},ct_math={level}",
        level = config.level
    ));

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "logging already initialized");
    }
}

/// Initialize logging with defaults (for tests and simple cases).
pub fn init_default_logging() {
    init_logging(&LogConfig::from_env(None, None));
}

/// Truncate a potentially large string for logging.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &s[..end])
}
