//! Error types for store operations.

use std::path::PathBuf;
use thiserror::Error;
use tl_common::{BucketError, CollectionId, MetricFamily, ProbeId, Timestamp};

/// Errors that can occur while reading or writing the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database exists but does not carry the expected schema
    #[error("invalid collection database {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// Probe id not present in the `probes` table
    #[error("unknown probe {0}")]
    UnknownProbe(ProbeId),

    /// Collection id not present in the `collections` table
    #[error("collection {0} not found")]
    CollectionNotFound(CollectionId),

    /// The store holds no collections at all
    #[error("no collections recorded in this store")]
    NoCollections,

    /// `close` called on a collection that already has an end timestamp
    #[error("collection {id} already closed at {end}")]
    AlreadyClosed { id: CollectionId, end: Timestamp },

    /// `close` called with an end before the start
    #[error("collection {id} cannot end at {end}, before its start {start}")]
    EndBeforeStart {
        id: CollectionId,
        start: Timestamp,
        end: Timestamp,
    },

    /// Delta array has the wrong width for its family
    #[error("{family} delta has {actual} cells, expected {expected}")]
    WidthMismatch {
        family: MetricFamily,
        expected: usize,
        actual: usize,
    },

    /// Bucket index cannot be encoded or a stored bucket cannot be decoded
    #[error("bucket error: {0}")]
    Bucket(#[from] BucketError),

    /// Count does not fit the signed INTEGER column
    #[error("count {0} exceeds the storable range")]
    CountOverflow(u64),

    /// A stored row violates the schema's value conventions
    #[error("malformed {table} row: {reason}")]
    MalformedRow { table: &'static str, reason: String },
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for tl_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidStore { .. } => tl_common::Error::InvalidStore(err.to_string()),
            StoreError::CollectionNotFound(_) | StoreError::NoCollections => {
                tl_common::Error::CollectionNotFound(err.to_string())
            }
            StoreError::WidthMismatch { .. } => tl_common::Error::WidthMismatch(err.to_string()),
            StoreError::Bucket(bucket) => tl_common::Error::Bucket(bucket),
            other => tl_common::Error::Store(other.to_string()),
        }
    }
}
