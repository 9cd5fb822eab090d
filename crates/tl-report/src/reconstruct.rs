//! Rebuild summaries and histograms of one closed collection.

use serde::{Deserialize, Serialize};
use tl_common::{CollectionId, LogBucket, ProbeId, LATENCY_BUCKETS};
use tl_config::ResultRange;
use tl_store::{
    CollectionRecord, HistogramStore, LatencyRow, ProbeRecord, ResultRow, TimeWindow,
    TransactionRecord,
};
use tracing::{debug, warn};

use crate::error::{ReportError, Result};
use crate::histogram::{FamilyHistograms, Trimmed};
use crate::summary::{summarize, SeriesPoint, ValueScale};

/// Everything the display layer needs about one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructedStats {
    pub collection: CollectionRecord,
    pub window: TimeWindow,
    pub probes: Vec<ProbeRecord>,

    /// Per-(timestamp, probe) latency summaries, ordered by (timestamp, probe).
    pub latency_series: Vec<SeriesPoint>,
    /// Per-(timestamp, probe) result-code summaries.
    pub result_series: Vec<SeriesPoint>,

    /// Latency histograms; bin is the log bucket index.
    pub latency: FamilyHistograms,
    /// Result-code histograms; bin is `code - result_range.min`.
    pub results: FamilyHistograms,
    pub result_range: ResultRange,
    /// Sum of counts of result rows outside `result_range`.
    pub out_of_range_results: u64,

    /// Exact-trace rows in the window, ordered by timestamp.
    pub transactions: Vec<TransactionRecord>,
}

impl ReconstructedStats {
    /// Global latency row of `probe` without leading/trailing zero buckets.
    /// `first` is the log bucket index of the first kept bin.
    pub fn trimmed_latency(&self, probe: ProbeId) -> Option<Trimmed> {
        self.latency.trimmed(probe, 0)
    }

    /// Global result row of `probe` without leading/trailing zero bins.
    /// `first` is the result code of the first kept bin.
    pub fn trimmed_results(&self, probe: ProbeId) -> Option<Trimmed> {
        self.results.trimmed(probe, self.result_range.min)
    }

    pub fn probe(&self, id: ProbeId) -> Option<&ProbeRecord> {
        self.probes.iter().find(|p| p.id == id)
    }
}

/// The requested collection, or the latest one when `None`.
pub fn resolve_collection(
    store: &mut HistogramStore,
    collection: Option<CollectionId>,
) -> Result<CollectionRecord> {
    let mut ledger = store.ledger();
    Ok(match collection {
        Some(id) => ledger.get(id)?,
        None => ledger.latest()?,
    })
}

/// Reconstruct statistics of a closed collection.
pub fn reconstruct(
    store: &mut HistogramStore,
    collection: CollectionId,
    result_range: ResultRange,
) -> Result<ReconstructedStats> {
    let record = store.ledger().get(collection)?;
    let window = record
        .window()
        .ok_or(ReportError::IncompleteCollection(collection))?;

    let probes = store.probes()?;
    let probe_ids: Vec<ProbeId> = probes.iter().map(|p| p.id).collect();

    let latency_rows = store.latency_rows_in(window)?;
    let result_rows = store.result_rows_in(window)?;
    let transactions = store.transactions_in(window)?;

    let latency_series = latency_series(&latency_rows);
    let result_series = result_series(&result_rows)?;

    let (latency, _) = FamilyHistograms::build(
        LATENCY_BUCKETS,
        &probe_ids,
        latency_rows
            .iter()
            .map(|r| (r.probe_id, r.timestamp, Some(r.bucket.index()), r.count)),
    );
    let (results, out_of_range_results) = FamilyHistograms::build(
        result_range.bins(),
        &probe_ids,
        result_rows
            .iter()
            .map(|r| (r.probe_id, r.timestamp, result_range.bin(r.code), r.count)),
    );
    if out_of_range_results > 0 {
        warn!(
            collection = %collection,
            count = out_of_range_results,
            min = result_range.min,
            max = result_range.max,
            "result codes outside histogram range"
        );
    }

    debug!(
        collection = %collection,
        latency_rows = latency_rows.len(),
        result_rows = result_rows.len(),
        transactions = transactions.len(),
        "collection reconstructed"
    );

    Ok(ReconstructedStats {
        collection: record,
        window,
        probes,
        latency_series,
        result_series,
        latency,
        results,
        result_range,
        out_of_range_results,
        transactions,
    })
}

/// Consecutive runs of rows sharing `(timestamp, probe)`.
fn groups<T, K, F>(rows: &[T], key: F) -> impl Iterator<Item = &[T]>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut rest = rows;
    std::iter::from_fn(move || {
        let first = rest.first()?;
        let k = key(first);
        let len = rest.iter().take_while(|r| key(r) == k).count();
        let (group, tail) = rest.split_at(len);
        rest = tail;
        Some(group)
    })
}

fn latency_series(rows: &[LatencyRow]) -> Vec<SeriesPoint> {
    groups(rows, |r| (r.timestamp, r.probe_id))
        .filter_map(|group| {
            let first = group.first()?;
            let summary = summarize(
                group.iter().map(|r| (bucket_value(r.bucket), r.count)),
                ValueScale::Log2,
            )?;
            Some(SeriesPoint {
                timestamp: first.timestamp,
                probe_id: first.probe_id,
                summary,
            })
        })
        .collect()
}

fn result_series(rows: &[ResultRow]) -> Result<Vec<SeriesPoint>> {
    let mut series = Vec::new();
    for group in groups(rows, |r| (r.timestamp, r.probe_id)) {
        for row in group {
            row.bucket()?;
        }
        let Some(first) = group.first() else {
            continue;
        };
        if let Some(summary) = summarize(
            group.iter().map(|r| (r.code as f64, r.count)),
            ValueScale::Identity,
        ) {
            series.push(SeriesPoint {
                timestamp: first.timestamp,
                probe_id: first.probe_id,
                summary,
            });
        }
    }
    Ok(series)
}

fn bucket_value(bucket: LogBucket) -> f64 {
    bucket.value() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_common::Timestamp;

    fn row(ts: i64, probe: i64, bucket: i64, count: u64) -> LatencyRow {
        LatencyRow {
            probe_id: ProbeId(probe),
            timestamp: Timestamp(ts),
            bucket: LogBucket::new(bucket).unwrap(),
            count,
        }
    }

    #[test]
    fn groups_split_on_key_change() {
        let rows = vec![
            row(1, 1, 0, 1),
            row(1, 1, 1, 3),
            row(1, 2, 0, 1),
            row(2, 1, 5, 1),
        ];
        let sizes: Vec<usize> = groups(&rows, |r| (r.timestamp, r.probe_id))
            .map(|g| g.len())
            .collect();
        assert_eq!(sizes, vec![2, 1, 1]);
    }

    #[test]
    fn latency_series_uses_log_scale() {
        let rows = vec![row(7, 1, 0, 1), row(7, 1, 1, 3), row(7, 1, 2, 1)];
        let series = latency_series(&rows);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].summary.median, 1.0);
        assert!((series[0].summary.mean - 2.2f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn undecodable_result_code_is_an_error() {
        let rows = vec![ResultRow {
            probe_id: ProbeId(1),
            timestamp: Timestamp(1),
            code: 42,
            count: 1,
        }];
        assert!(matches!(
            result_series(&rows),
            Err(ReportError::Store(_))
        ));
    }
}
