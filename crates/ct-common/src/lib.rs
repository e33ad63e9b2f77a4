//! Connection Triage common types, identities, and errors.
//!
//! This crate provides foundational types shared across ct-core modules:
//! - The error taxonomy with client/internal classification
//! - Record and request identity types
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use id::{RecordId, RequestId};
pub use output::OutputFormat;
