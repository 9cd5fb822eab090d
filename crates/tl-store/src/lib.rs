//! txlat sparse histogram store.
//!
//! This crate provides:
//! - The persisted SQLite schema and its validation
//! - Sparse writers for latency and result-code interval deltas
//! - The collection ledger that brackets a sampling run
//! - Window readers used by the statistics reconstructor

pub mod error;
pub mod ledger;
pub mod query;
pub mod rows;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use ledger::{CollectionLedger, CollectionRecord};
pub use rows::{
    IntervalSample, LatencyRow, ProbeRecord, ResultDeltas, ResultRow, TimeWindow,
    TransactionRecord,
};
pub use schema::TableName;
pub use store::HistogramStore;
