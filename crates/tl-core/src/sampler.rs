//! The sampling loop.
//!
//! Every timeslice: pull a snapshot per sampled probe, turn it into
//! interval deltas, commit one store transaction per probe, then drain the
//! exact-trace events. Sleeping happens in short steps so cancellation is
//! noticed within one poll interval.

use serde::Serialize;
use std::time::{Duration, Instant};
use tl_common::{
    MetricFamily, ResultFamily, Timestamp, FEE_CHARGED_CELLS, NO_FEE_CELLS,
};
use tl_config::ProbeSpec;
use tl_store::{HistogramStore, IntervalSample, ResultDeltas, TransactionRecord};
use tracing::{debug, info};

use crate::accumulator::DeltaAccumulator;
use crate::cancel::CancelToken;
use crate::error::TraceError;
use crate::source::{ProbeSnapshot, SnapshotSource};

/// Default granularity at which a sleeping loop checks for cancellation.
pub const DEFAULT_POLL: Duration = Duration::from_millis(200);

/// Timing of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub timeslice: Duration,
    /// Total sampling time; unbounded when `None`.
    pub duration: Option<Duration>,
    pub poll: Duration,
}

impl LoopSettings {
    pub fn from_secs(timeslice_secs: u64, duration_secs: Option<u64>) -> Self {
        Self {
            timeslice: Duration::from_secs(timeslice_secs),
            duration: duration_secs.map(Duration::from_secs),
            poll: DEFAULT_POLL,
        }
    }
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    DurationElapsed,
    Cancelled,
}

/// Running totals of a trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SamplerTotals {
    pub intervals: u64,
    pub rows: u64,
    pub transactions: u64,
    /// Families left out of an interval because of a counter regression.
    pub skipped_families: u64,
}

/// Drives one source into one store.
pub struct Sampler<'a, S: SnapshotSource> {
    source: &'a mut S,
    store: &'a mut HistogramStore,
    accumulator: DeltaAccumulator,
    probes: Vec<ProbeSpec>,
    totals: SamplerTotals,
}

impl<'a, S: SnapshotSource> Sampler<'a, S> {
    /// `probes` should be the sampled probes the source was attached for.
    pub fn new(
        source: &'a mut S,
        store: &'a mut HistogramStore,
        accumulator: DeltaAccumulator,
        probes: Vec<ProbeSpec>,
    ) -> Self {
        Self {
            source,
            store,
            accumulator,
            probes,
            totals: SamplerTotals::default(),
        }
    }

    pub fn totals(&self) -> SamplerTotals {
        self.totals
    }

    pub fn accumulator(&self) -> &DeltaAccumulator {
        &self.accumulator
    }

    /// Sample every probe once and drain transaction events, stamping the
    /// interval with `ts`.
    pub fn sample_once(&mut self, ts: Timestamp) -> Result<(), TraceError> {
        let mut rows = 0usize;
        for i in 0..self.probes.len() {
            let probe = &self.probes[i];
            let snapshot = self.source.snapshot(probe)?;
            let sample = self.interval_sample(i, ts, &snapshot)?;
            rows += self.store.write_interval(&sample)?;
        }

        let events = self.source.drain_transactions()?;
        for event in &events {
            self.store.add_transaction(&TransactionRecord {
                id: event.id,
                tx_type: event.tx_type,
                timestamp: event.timestamp.unwrap_or(ts),
                duration_ns: event.duration_ns,
                result: event.result,
            })?;
        }

        self.totals.intervals += 1;
        self.totals.rows += rows as u64;
        self.totals.transactions += events.len() as u64;
        debug!(
            timestamp = ts.0,
            rows,
            transactions = events.len(),
            "interval sampled"
        );
        Ok(())
    }

    fn interval_sample(
        &mut self,
        index: usize,
        ts: Timestamp,
        snapshot: &ProbeSnapshot,
    ) -> Result<IntervalSample, TraceError> {
        let probe = &self.probes[index];
        let probe_id = probe.id;
        let (sample_latency, sample_results) = (probe.sample_latency, probe.sample_results);

        let latency = if sample_latency {
            self.delta(MetricFamily::Latency, probe_id, &snapshot.dist)?
        } else {
            None
        };

        let results = if sample_results {
            let success =
                self.delta(MetricFamily::Result(ResultFamily::Success), probe_id, &snapshot.result)?;
            let fee_charged = self.delta(
                MetricFamily::Result(ResultFamily::FeeCharged),
                probe_id,
                &snapshot.tecs,
            )?;
            let no_fee =
                self.delta(MetricFamily::Result(ResultFamily::NoFee), probe_id, &snapshot.negs)?;
            if success.is_none() && fee_charged.is_none() && no_fee.is_none() {
                None
            } else {
                Some(ResultDeltas {
                    success: success.and_then(|v| v.first().copied()).unwrap_or(0),
                    fee_charged: fee_charged.unwrap_or_else(|| vec![0; FEE_CHARGED_CELLS]),
                    no_fee: no_fee.unwrap_or_else(|| vec![0; NO_FEE_CELLS]),
                })
            }
        } else {
            None
        };

        Ok(IntervalSample {
            probe_id,
            timestamp: ts,
            latency,
            results,
        })
    }

    fn delta(
        &mut self,
        family: MetricFamily,
        probe_id: tl_common::ProbeId,
        cells: &[u64],
    ) -> Result<Option<Vec<u64>>, TraceError> {
        let delta = self.accumulator.compute_delta(family, probe_id, cells)?;
        if delta.is_none() {
            self.totals.skipped_families += 1;
        }
        Ok(delta)
    }

    /// Sample every timeslice until the duration elapses or `cancel` fires.
    ///
    /// A timeslice cut short by cancellation is not sampled.
    pub fn run(&mut self, settings: LoopSettings, cancel: &CancelToken) -> Result<StopReason, TraceError> {
        let mut elapsed = Duration::ZERO;
        loop {
            if !sleep_unless_cancelled(settings.timeslice, settings.poll, cancel) {
                info!(intervals = self.totals.intervals, "trace cancelled");
                return Ok(StopReason::Cancelled);
            }
            self.sample_once(Timestamp::now())?;
            elapsed += settings.timeslice;
            if settings.duration.is_some_and(|d| elapsed >= d) {
                info!(intervals = self.totals.intervals, "trace duration elapsed");
                return Ok(StopReason::DurationElapsed);
            }
        }
    }
}

/// Sleep for `total` in steps of at most `poll`. Returns `false` as soon as
/// `cancel` is observed.
fn sleep_unless_cancelled(total: Duration, poll: Duration, cancel: &CancelToken) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(poll.min(deadline - now).max(Duration::from_millis(1)));
    }
}
