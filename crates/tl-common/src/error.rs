//! Error types for txlat.

use thiserror::Error;

/// Result type alias for txlat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type reported by the `txlat` binary.
///
/// Each crate keeps its own error enum; this type flattens them into a
/// stable category with a numeric code for JSON error output.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    // Attach errors (20-29)
    #[error("no attach points matched in {target}")]
    NoAttachPoints { target: String },

    #[error("invalid trace target: {0}")]
    InvalidTarget(String),

    // Sampling errors (30-39)
    #[error("sampling failed: {0}")]
    Sampling(String),

    #[error("counter width mismatch: {0}")]
    WidthMismatch(String),

    // Store errors (40-49)
    #[error("store error: {0}")]
    Store(String),

    #[error("invalid collection database: {0}")]
    InvalidStore(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    // Report errors (50-59)
    #[error("collection {0} is still open")]
    IncompleteCollection(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(String),

    // Bucket encoding errors (70-79)
    #[error("bucket error: {0}")]
    Bucket(#[from] crate::bucket::BucketError),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::NoAttachPoints { .. } => 20,
            Error::InvalidTarget(_) => 21,
            Error::Sampling(_) => 30,
            Error::WidthMismatch(_) => 31,
            Error::Store(_) => 40,
            Error::InvalidStore(_) => 41,
            Error::CollectionNotFound(_) => 42,
            Error::IncompleteCollection(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Bucket(_) => 70,
        }
    }

    /// Short machine-readable category name.
    pub fn kind(&self) -> &'static str {
        match self.code() / 10 {
            1 => "config",
            2 => "attach",
            3 => "sampling",
            4 => "store",
            5 => "report",
            6 => "io",
            _ => "encoding",
        }
    }
}
