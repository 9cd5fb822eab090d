//! txlat common types.
//!
//! This crate provides foundational types shared by the store, report and
//! core crates:
//! - Probe, collection and transaction identity types
//! - Log-bucket and result-code bucket index types with their storage encodings
//! - Wall-clock timestamps in the unit the store persists
//! - A unified error type with numeric codes for CLI reporting

pub mod bucket;
pub mod error;
pub mod id;

pub use bucket::{
    BucketError, LogBucket, MetricFamily, ResultBucket, ResultFamily, FEE_CHARGED_CELLS,
    FEE_CHARGED_OFFSET, LATENCY_BUCKETS, NO_FEE_CELLS, SUCCESS_CELLS,
};
pub use error::{Error, Result};
pub use id::{CollectionId, ProbeId, Timestamp, TxId};
