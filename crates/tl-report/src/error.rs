//! Error types for reconstruction.

use std::path::PathBuf;
use thiserror::Error;
use tl_common::CollectionId;
use tl_store::StoreError;

/// Errors from reconstructing statistics.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The collection has no end timestamp yet.
    #[error("collection {0} is still open")]
    IncompleteCollection(CollectionId),

    /// The store path could not be canonicalized.
    #[error("cannot resolve store path {path}: {source}")]
    StorePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for reconstruction.
pub type Result<T> = std::result::Result<T, ReportError>;

impl From<ReportError> for tl_common::Error {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::Store(store) => store.into(),
            ReportError::IncompleteCollection(id) => {
                tl_common::Error::IncompleteCollection(id.to_string())
            }
            ReportError::StorePath { .. } => tl_common::Error::InvalidStore(err.to_string()),
        }
    }
}
