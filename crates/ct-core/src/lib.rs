//! Connection Triage Core Library
//!
//! Scores Zeek-style connection records with a pre-fitted classifier and
//! compares subgroups of the scored population with two-sample t-tests:
//! - Feature encoding (IPv4 codec, categorical encoders, feature builder)
//! - Model artifacts and scoring adapters
//! - Dataset loading, partitioning, and hypothesis testing
//! - Analyses, ranking, and the HTTP API
//!
//! The binary entry point is in `main.rs`.

pub mod analysis;
pub mod config;
pub mod context;
pub mod dataset;
pub mod encode;
pub mod exit_codes;
pub mod features;
pub mod hypothesis;
pub mod logging;
pub mod model;
pub mod partition;
pub mod rank;
pub mod record;
pub mod server;

#[cfg(test)]
pub mod test_utils;

pub use context::AppContext;
pub use record::ConnectionRecord;
