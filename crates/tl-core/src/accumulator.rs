//! Cumulative-to-interval delta computation.
//!
//! The kernel side only ever increments its counters, so each snapshot is a
//! running total since attach. The accumulator remembers the last snapshot
//! per (family, probe) and turns the next one into the counts of the
//! interval in between.
//!
//! ```text
//! snapshot ──► compute_delta()
//!                  │
//!                  ├─ first for key   → baseline: snapshot returned as-is
//!                  ├─ all cells >=    → snapshot - previous
//!                  └─ any cell <      → CounterRegression recorded, then
//!                                       NegativeDeltaPolicy decides
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tl_common::{MetricFamily, ProbeId};
use tl_config::NegativeDeltaPolicy;
use tracing::warn;

/// Errors from delta computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    #[error("{family} snapshot for probe {probe_id} has {actual} cells, expected {expected}")]
    WidthMismatch {
        family: MetricFamily,
        probe_id: ProbeId,
        expected: usize,
        actual: usize,
    },
}

/// A cumulative counter observed to decrease between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRegression {
    pub family: MetricFamily,
    pub probe_id: ProbeId,
    /// Indices of the cells that went down.
    pub cells: Vec<usize>,
    pub policy: NegativeDeltaPolicy,
}

/// Number of most recent regressions kept in full.
pub const ANOMALY_HISTORY: usize = 1024;

/// Per-run delta state, keyed by (family, probe).
#[derive(Debug)]
pub struct DeltaAccumulator {
    policy: NegativeDeltaPolicy,
    previous: HashMap<(MetricFamily, ProbeId), Vec<u64>>,
    anomalies: Vec<CounterRegression>,
    regressions: u64,
}

impl DeltaAccumulator {
    pub fn new(policy: NegativeDeltaPolicy) -> Self {
        Self {
            policy,
            previous: HashMap::new(),
            anomalies: Vec::new(),
            regressions: 0,
        }
    }

    pub fn policy(&self) -> NegativeDeltaPolicy {
        self.policy
    }

    /// The last [`ANOMALY_HISTORY`] regressions, oldest first.
    pub fn anomalies(&self) -> &[CounterRegression] {
        &self.anomalies
    }

    /// Total regressions observed, including those dropped from the history.
    pub fn regression_count(&self) -> u64 {
        self.regressions
    }

    /// Whether a baseline exists for this key.
    pub fn has_baseline(&self, family: MetricFamily, probe_id: ProbeId) -> bool {
        self.previous.contains_key(&(family, probe_id))
    }

    /// Interval delta for a new cumulative snapshot.
    ///
    /// Returns `Ok(None)` when a regression was resolved by skipping the
    /// interval. The snapshot always becomes the new baseline.
    pub fn compute_delta(
        &mut self,
        family: MetricFamily,
        probe_id: ProbeId,
        snapshot: &[u64],
    ) -> Result<Option<Vec<u64>>, AccumulatorError> {
        let expected = family.width();
        if snapshot.len() != expected {
            return Err(AccumulatorError::WidthMismatch {
                family,
                probe_id,
                expected,
                actual: snapshot.len(),
            });
        }

        let key = (family, probe_id);
        let Some(previous) = self.previous.insert(key, snapshot.to_vec()) else {
            return Ok(Some(snapshot.to_vec()));
        };

        let regressed: Vec<usize> = snapshot
            .iter()
            .zip(&previous)
            .enumerate()
            .filter(|(_, (new, old))| new < old)
            .map(|(i, _)| i)
            .collect();

        if regressed.is_empty() {
            return Ok(Some(
                snapshot
                    .iter()
                    .zip(&previous)
                    .map(|(new, old)| new - old)
                    .collect(),
            ));
        }

        warn!(
            family = %family,
            probe = %probe_id,
            cells = regressed.len(),
            first_cell = regressed[0],
            policy = self.policy.name(),
            "cumulative counter decreased"
        );
        self.regressions += 1;
        if self.anomalies.len() == ANOMALY_HISTORY {
            self.anomalies.remove(0);
        }
        self.anomalies.push(CounterRegression {
            family,
            probe_id,
            cells: regressed,
            policy: self.policy,
        });

        Ok(match self.policy {
            NegativeDeltaPolicy::Skip => None,
            NegativeDeltaPolicy::Rebaseline => Some(snapshot.to_vec()),
        })
    }
}
