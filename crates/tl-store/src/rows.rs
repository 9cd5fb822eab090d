//! Row types and the sparse encoding of interval deltas.

use serde::{Deserialize, Serialize};
use tl_common::{
    LogBucket, MetricFamily, ProbeId, ResultBucket, ResultFamily, Timestamp, TxId,
    LATENCY_BUCKETS,
};

use crate::error::{Result, StoreError};

/// A row of the `probes` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub id: ProbeId,
    pub description: String,
}

/// Inclusive time window `[start, end]` of a closed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// A row of the `timings` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRow {
    pub probe_id: ProbeId,
    pub timestamp: Timestamp,
    pub bucket: LogBucket,
    pub count: u64,
}

/// A row of the `ters` table. `code` is the stored (encoded) bucket, which
/// is also the observed result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub probe_id: ProbeId,
    pub timestamp: Timestamp,
    pub code: i64,
    pub count: u64,
}

impl ResultRow {
    pub fn bucket(&self) -> Result<ResultBucket> {
        Ok(ResultBucket::decode(self.code)?)
    }
}

/// A row of the `transactions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TxId,
    pub tx_type: u32,
    pub timestamp: Timestamp,
    pub duration_ns: u64,
    pub result: i32,
}

/// One interval's result-code deltas for one probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDeltas {
    pub success: u64,
    pub fee_charged: Vec<u64>,
    pub no_fee: Vec<u64>,
}

impl ResultDeltas {
    /// Per-family view, used by width validation and encoding.
    pub fn family(&self, family: ResultFamily) -> &[u64] {
        match family {
            ResultFamily::Success => std::slice::from_ref(&self.success),
            ResultFamily::FeeCharged => &self.fee_charged,
            ResultFamily::NoFee => &self.no_fee,
        }
    }
}

/// Everything sampled for one probe in one interval. Either part may be
/// absent when the probe does not sample it or its delta was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSample {
    pub probe_id: ProbeId,
    pub timestamp: Timestamp,
    pub latency: Option<Vec<u64>>,
    pub results: Option<ResultDeltas>,
}

pub(crate) fn storable(count: u64) -> Result<i64> {
    i64::try_from(count).map_err(|_| StoreError::CountOverflow(count))
}

/// Nonzero `(log_bin, counts)` pairs of a latency delta.
pub(crate) fn encode_latency(delta: &[u64]) -> Result<Vec<(i64, i64)>> {
    if delta.len() != LATENCY_BUCKETS {
        return Err(StoreError::WidthMismatch {
            family: MetricFamily::Latency,
            expected: LATENCY_BUCKETS,
            actual: delta.len(),
        });
    }
    delta
        .iter()
        .enumerate()
        .filter(|(_, &count)| count != 0)
        .map(|(index, &count)| {
            let bucket = LogBucket::new(index as i64)?;
            Ok((i64::from(bucket), storable(count)?))
        })
        .collect()
}

/// Nonzero `(ter, counts)` pairs of a result delta.
///
/// Fails before producing anything if a family has the wrong width or a
/// nonzero cell has no encoding.
pub(crate) fn encode_results(deltas: &ResultDeltas) -> Result<Vec<(i64, i64)>> {
    let mut rows = Vec::new();
    for family in ResultFamily::ALL {
        let cells = deltas.family(family);
        if cells.len() != family.width() {
            return Err(StoreError::WidthMismatch {
                family: MetricFamily::Result(family),
                expected: family.width(),
                actual: cells.len(),
            });
        }
        for (index, &count) in cells.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let bucket = ResultBucket::from_family_index(family, index)?;
            rows.push((bucket.encode(), storable(count)?));
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_common::{BucketError, FEE_CHARGED_CELLS, NO_FEE_CELLS};

    fn empty_results() -> ResultDeltas {
        ResultDeltas {
            success: 0,
            fee_charged: vec![0; FEE_CHARGED_CELLS],
            no_fee: vec![0; NO_FEE_CELLS],
        }
    }

    #[test]
    fn latency_encoding_skips_zeros() {
        let mut delta = vec![0u64; LATENCY_BUCKETS];
        delta[3] = 7;
        delta[63] = 1;
        assert_eq!(encode_latency(&delta).unwrap(), vec![(3, 7), (63, 1)]);
        assert!(encode_latency(&vec![0; LATENCY_BUCKETS]).unwrap().is_empty());
    }

    #[test]
    fn latency_encoding_checks_width() {
        let err = encode_latency(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WidthMismatch {
                expected: 64,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn result_encoding_uses_offsets() {
        let mut deltas = empty_results();
        deltas.success = 5;
        deltas.fee_charged[3] = 2;
        deltas.no_fee[2] = 9;
        assert_eq!(
            encode_results(&deltas).unwrap(),
            vec![(0, 5), (103, 2), (-2, 9)]
        );
    }

    #[test]
    fn result_encoding_rejects_no_fee_index_zero() {
        let mut deltas = empty_results();
        deltas.success = 1;
        deltas.no_fee[0] = 1;
        let err = encode_results(&deltas).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Bucket(BucketError::NoFeeIndexZero)
        ));
    }

    #[test]
    fn count_overflow_is_reported() {
        let mut delta = vec![0u64; LATENCY_BUCKETS];
        delta[0] = u64::MAX;
        assert!(matches!(
            encode_latency(&delta),
            Err(StoreError::CountOverflow(u64::MAX))
        ));
    }

    #[test]
    fn window_is_inclusive() {
        let window = TimeWindow {
            start: Timestamp(100),
            end: Timestamp(200),
        };
        assert!(window.contains(Timestamp(100)));
        assert!(window.contains(Timestamp(200)));
        assert!(!window.contains(Timestamp(99)));
        assert!(!window.contains(Timestamp(201)));
    }
}
