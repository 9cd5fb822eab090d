//! Error type of the trace pipeline.

use thiserror::Error;
use tl_config::ValidationError;
use tl_store::StoreError;

use crate::accumulator::AccumulatorError;
use crate::source::SourceError;

/// Errors that abort a trace run.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),

    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl From<TraceError> for tl_common::Error {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::Config(e) => e.into(),
            TraceError::Source(e) => e.into(),
            TraceError::Store(e) => e.into(),
            TraceError::Accumulator(e) => tl_common::Error::WidthMismatch(e.to_string()),
            TraceError::Signals(e) => tl_common::Error::Io(e),
        }
    }
}
