//! Exit codes for the ct-core CLI.
//!
//! Exit code ranges:
//! - 0-2: Outcomes (clean run, or the verdict of a hypothesis test)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use ct_common::{Error, ErrorCategory};

/// Exit codes for ct-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Outcomes (0-2)
    // ========================================================================
    /// Success
    Clean = 0,

    /// Hypothesis test failed to reject the null
    NullSupported = 1,

    /// Hypothesis test rejected the null
    AlternativeSupported = 2,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments or parameters
    ArgsError = 10,

    /// Model or encoder artifact missing or invalid
    ArtifactError = 11,

    /// Configuration invalid
    ConfigError = 12,

    /// Caller input rejected (bad address, unknown label, empty group)
    InputError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (scoring or dataset failure)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Codes below 10 are outcomes, not failures.
    pub fn is_operational(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NullSupported => "OK_NULL_SUPPORTED",
            ExitCode::AlternativeSupported => "OK_ALTERNATIVE_SUPPORTED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ArtifactError => "ERR_ARTIFACT",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidParameter { .. } => ExitCode::ArgsError,
            Error::InvalidAddress { .. }
            | Error::UnknownCategory { .. }
            | Error::EmptyGroup { .. } => ExitCode::InputError,
            Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Artifact => ExitCode::ArtifactError,
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io => ExitCode::IoError,
                _ => ExitCode::InternalError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
