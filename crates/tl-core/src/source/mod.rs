//! Snapshot sources: the boundary to the kernel-tracing layer.
//!
//! A source attaches instrumentation to a target and, on demand, hands back
//! the cumulative counters it maintains per probe. The trace loop never
//! sees how the counters are kept.

mod map_dump;
mod target;

pub use map_dump::{MapDumpSource, SNAPSHOT_FILE_PREFIX, TX_EVENTS_FILE};
pub use target::{count_symbols, resolve_target, TargetSpec};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tl_common::{ProbeId, Timestamp, TxId};
use tl_config::ProbeSpec;

/// Errors raised at the snapshot source boundary.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot resolve trace target {0}")]
    TargetUnresolved(String),

    #[error("cannot read trace target {path}: {source}")]
    TargetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid symbol pattern: {0}")]
    InvalidSymbolPattern(String),

    #[error("0 attach points matched in {target}")]
    NoAttachPoints { target: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("no snapshot available for probe {0}")]
    MissingSnapshot(ProbeId),

    #[error("source used before attach")]
    NotAttached,
}

impl From<SourceError> for tl_common::Error {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::TargetUnresolved(_) | SourceError::TargetUnreadable { .. } => {
                tl_common::Error::InvalidTarget(err.to_string())
            }
            SourceError::InvalidSymbolPattern(_) => tl_common::Error::Config(err.to_string()),
            SourceError::NoAttachPoints { target } => {
                tl_common::Error::NoAttachPoints { target }
            }
            SourceError::Io { .. }
            | SourceError::Malformed { .. }
            | SourceError::MissingSnapshot(_)
            | SourceError::NotAttached => tl_common::Error::Sampling(err.to_string()),
        }
    }
}

/// Cumulative counters of one probe, as maintained by the kernel side.
///
/// Arrays a probe does not maintain may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSnapshot {
    /// Latency histogram, one cell per log2 bucket.
    #[serde(default)]
    pub dist: Vec<u64>,
    /// Success count (a single cell).
    #[serde(default)]
    pub result: Vec<u64>,
    /// Fee-charged result family.
    #[serde(default)]
    pub tecs: Vec<u64>,
    /// No-fee (negative code) result family.
    #[serde(default)]
    pub negs: Vec<u64>,
}

/// One transaction seen by the exact-trace path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: TxId,
    pub tx_type: u32,
    pub result: i32,
    pub duration_ns: u64,
    /// When the source stamped the event; the drain time otherwise.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// Source of cumulative counter snapshots.
pub trait SnapshotSource {
    /// Attach instrumentation for `probes`, returning how many attach
    /// points matched. Zero matches is an error.
    fn attach(&mut self, probes: &[ProbeSpec]) -> Result<usize, SourceError>;

    /// Current cumulative counters of `probe`.
    fn snapshot(&mut self, probe: &ProbeSpec) -> Result<ProbeSnapshot, SourceError>;

    /// Exact-trace events observed since the previous drain.
    fn drain_transactions(&mut self) -> Result<Vec<TransactionEvent>, SourceError>;

    /// Human-readable description of what is being traced.
    fn describe(&self) -> String;
}
