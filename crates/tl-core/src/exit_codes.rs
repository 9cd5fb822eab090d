//! Exit codes for the txlat CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//! These are stable across releases.

/// Exit codes for txlat operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Completed normally
    Clean = 0,

    /// Trace stopped by SIGINT/SIGTERM; the collection was closed
    Interrupted = 6,

    /// Configuration error
    ConfigError = 10,

    /// Target could not be resolved or no attach points matched
    AttachError = 11,

    /// Snapshot source or sampling failure
    SamplingError = 12,

    /// Collection database error
    StoreError = 13,

    /// Reconstruction error (including still-open collections)
    ReportError = 14,

    /// I/O error
    IoError = 15,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::Interrupted)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Exit code for a failure reported through the unified error type.
    pub fn for_error(err: &tl_common::Error) -> Self {
        match err.code() / 10 {
            1 => ExitCode::ConfigError,
            2 => ExitCode::AttachError,
            3 => ExitCode::SamplingError,
            4 => ExitCode::StoreError,
            5 => ExitCode::ReportError,
            6 => ExitCode::IoError,
            7 => ExitCode::StoreError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
