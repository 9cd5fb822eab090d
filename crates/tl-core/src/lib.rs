//! txlat sampling pipeline.
//!
//! This crate provides:
//! - The delta accumulator that turns cumulative counters into interval deltas
//! - The snapshot source boundary and the map-dump adapter
//! - The sampling loop with cooperative cancellation
//! - A trace runner that brackets the loop with a collection
//! - Logging setup, exit codes and the `txlat` command line

pub mod accumulator;
pub mod cancel;
pub mod cli;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod sampler;
pub mod source;
pub mod trace;

pub use accumulator::{AccumulatorError, CounterRegression, DeltaAccumulator, ANOMALY_HISTORY};
pub use cancel::CancelToken;
pub use error::TraceError;
pub use exit_codes::ExitCode;
pub use sampler::{LoopSettings, Sampler, SamplerTotals, StopReason};
pub use source::{
    MapDumpSource, ProbeSnapshot, SnapshotSource, SourceError, TargetSpec, TransactionEvent,
};
pub use trace::{run_trace, TraceOutcome, TraceRequest};
