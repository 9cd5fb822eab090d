//! A complete trace run: attach, open a collection, sample, close.
//!
//! The collection is closed on every exit path. Normal completion and
//! cancellation close it explicitly; a sampling error closes it before the
//! error is returned; a panic closes it from [`OpenCollection`]'s `Drop`.

use serde::Serialize;
use std::path::PathBuf;
use tl_common::{CollectionId, Timestamp};
use tl_config::{ProbeSpec, TraceConfig};
use tl_store::{HistogramStore, ProbeRecord, StoreError};
use tracing::{error, info, warn};

use crate::accumulator::{CounterRegression, DeltaAccumulator};
use crate::cancel::CancelToken;
use crate::error::TraceError;
use crate::sampler::{LoopSettings, Sampler, SamplerTotals, StopReason};
use crate::source::SnapshotSource;

/// What to record and where.
#[derive(Debug, Clone)]
pub struct TraceRequest {
    pub db: PathBuf,
    /// Build identifier stored as the collection's `git_commit`.
    pub build_id: String,
    pub tags: Vec<String>,
}

/// Summary of a finished trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceOutcome {
    pub collection: CollectionId,
    pub stop: StopReason,
    pub attach_points: usize,
    pub totals: SamplerTotals,
    /// Every counter regression seen, including those no longer in `anomalies`.
    pub regressions: u64,
    /// The most recent regressions, oldest first.
    pub anomalies: Vec<CounterRegression>,
}

/// An open collection that closes itself if dropped while still open.
struct OpenCollection {
    store: HistogramStore,
    id: CollectionId,
    start: Timestamp,
    closed: bool,
}

impl OpenCollection {
    fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Wall clock may step back; a collection never ends before it starts.
        let end = Timestamp::now().max(self.start);
        self.store.ledger().close(self.id, end)
    }
}

impl Drop for OpenCollection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.close() {
            Ok(()) => warn!(collection = %self.id, "collection closed during unwind"),
            Err(e) => error!(collection = %self.id, error = %e, "failed to close collection"),
        }
    }
}

/// Probe rows seeded into a fresh store.
pub fn probe_records(probes: &[ProbeSpec]) -> Vec<ProbeRecord> {
    probes
        .iter()
        .map(|p| ProbeRecord {
            id: p.id,
            description: p.description.clone(),
        })
        .collect()
}

/// Run a trace until the configured duration elapses or `cancel` fires.
///
/// Nothing is written, and no collection is opened, unless the source
/// attaches at least one point.
pub fn run_trace<S: SnapshotSource>(
    config: &TraceConfig,
    request: &TraceRequest,
    source: &mut S,
    settings: LoopSettings,
    cancel: &CancelToken,
) -> Result<TraceOutcome, TraceError> {
    config.validate()?;
    let sampled: Vec<ProbeSpec> = config.sampled_probes().cloned().collect();
    let attach_points = source.attach(&sampled)?;

    let mut store = HistogramStore::create_or_open(&request.db, &probe_records(&config.probes))?;
    let start = Timestamp::now();
    let id = store
        .ledger()
        .open_at(start, &request.build_id, &request.tags)?;
    let mut collection = OpenCollection {
        store,
        id,
        start,
        closed: false,
    };

    info!(
        collection = %id,
        source = %source.describe(),
        probes = sampled.len(),
        timeslice_secs = settings.timeslice.as_secs(),
        duration_secs = settings.duration.map(|d| d.as_secs()),
        policy = config.negative_delta.name(),
        "trace started"
    );

    let (result, totals, regressions, anomalies) = {
        let mut sampler = Sampler::new(
            source,
            &mut collection.store,
            DeltaAccumulator::new(config.negative_delta),
            sampled,
        );
        let result = sampler.run(settings, cancel);
        (
            result,
            sampler.totals(),
            sampler.accumulator().regression_count(),
            sampler.accumulator().anomalies().to_vec(),
        )
    };

    let closed = collection.close();
    let stop = match (result, closed) {
        (Ok(stop), Ok(())) => stop,
        (Ok(_), Err(close_err)) => return Err(close_err.into()),
        (Err(run_err), close) => {
            if let Err(close_err) = close {
                error!(collection = %id, error = %close_err, "failed to close collection");
            }
            error!(collection = %id, error = %run_err, "trace failed");
            return Err(run_err);
        }
    };

    info!(
        collection = %id,
        stop = ?stop,
        intervals = totals.intervals,
        rows = totals.rows,
        transactions = totals.transactions,
        regressions,
        "trace finished"
    );
    Ok(TraceOutcome {
        collection: id,
        stop,
        attach_points,
        totals,
        regressions,
        anomalies,
    })
}
