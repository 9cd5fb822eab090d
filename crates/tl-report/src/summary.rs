//! Per-interval summary statistics over bucketed counts.
//!
//! A group is the set of `(bucket, count)` rows of one probe at one
//! timestamp. Buckets are visited in ascending order:
//!
//! 1. `count` is the sum of counts; an empty group yields no summary.
//! 2. `mean` is the mean of bucket values weighted by count.
//! 3. `min`/`max` are the values of the first/last nonzero bucket.
//! 4. `median` is the value of the first bucket where the running total
//!    reaches half of `count`.
//!
//! With [`ValueScale::Log2`] every statistic except `count` is reported as
//! `log2` of the linear value (so `mean` is the log of the linear mean).

use serde::{Deserialize, Serialize};
use tl_common::{ProbeId, Timestamp};

/// How bucket values are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueScale {
    /// Latency buckets: values are powers of two, reported as exponents.
    Log2,
    /// Result codes: values reported as-is.
    Identity,
}

impl ValueScale {
    fn report(self, value: f64) -> f64 {
        match self {
            ValueScale::Log2 => value.log2(),
            ValueScale::Identity => value,
        }
    }
}

/// Summary of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// A summary keyed by the interval and probe it describes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: Timestamp,
    pub probe_id: ProbeId,
    #[serde(flatten)]
    pub summary: Summary,
}

/// Summarize `(value, count)` cells given in ascending value order.
///
/// Returns `None` when the total count is zero.
pub fn summarize<I>(cells: I, scale: ValueScale) -> Option<Summary>
where
    I: IntoIterator<Item = (f64, u64)>,
{
    let cells: Vec<(f64, u64)> = cells.into_iter().filter(|&(_, c)| c > 0).collect();
    let count: u64 = cells.iter().map(|&(_, c)| c).sum();
    if count == 0 {
        return None;
    }

    let weighted: f64 = cells.iter().map(|&(v, c)| v * c as f64).sum();
    let linear_mean = weighted / count as f64;

    let min = cells.first().map(|&(v, _)| v)?;
    let max = cells.last().map(|&(v, _)| v)?;

    // Running total reaches count/2, compared as 2*running >= count.
    let mut running: u128 = 0;
    let mut median = max;
    for &(value, c) in &cells {
        running += u128::from(c);
        if 2 * running >= u128::from(count) {
            median = value;
            break;
        }
    }

    Some(Summary {
        count,
        mean: scale.report(linear_mean),
        median: scale.report(median),
        min: scale.report(min),
        max: scale.report(max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn log_cells(cells: &[(u32, u64)]) -> Vec<(f64, u64)> {
        cells
            .iter()
            .map(|&(b, c)| (2f64.powi(b as i32), c))
            .collect()
    }

    #[test]
    fn three_bucket_example() {
        let s = summarize(log_cells(&[(0, 1), (1, 3), (2, 1)]), ValueScale::Log2).unwrap();
        assert_eq!(s.count, 5);
        assert_eq!(s.median, 1.0);
        assert!((s.mean - 2.2f64.log2()).abs() < 1e-12);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 2.0);
    }

    #[test]
    fn empty_group_is_dropped() {
        assert!(summarize(Vec::new(), ValueScale::Log2).is_none());
        assert!(summarize(vec![(4.0, 0)], ValueScale::Log2).is_none());
    }

    #[test]
    fn zero_cells_do_not_move_min_or_max() {
        let s = summarize(
            vec![(1.0, 0), (2.0, 2), (8.0, 2), (16.0, 0)],
            ValueScale::Log2,
        )
        .unwrap();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        // Half of 4 is reached exactly by the first nonzero bucket.
        assert_eq!(s.median, 1.0);
    }

    #[test]
    fn identity_scale_reports_codes() {
        let s = summarize(
            vec![(-2.0, 1), (0.0, 6), (103.0, 1)],
            ValueScale::Identity,
        )
        .unwrap();
        assert_eq!(s.count, 8);
        assert_eq!(s.min, -2.0);
        assert_eq!(s.max, 103.0);
        assert_eq!(s.median, 0.0);
        assert!((s.mean - 101.0 / 8.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn statistics_stay_within_bounds(
            counts in prop::collection::vec(0u64..1_000, 1..64)
        ) {
            let cells: Vec<(f64, u64)> = counts
                .iter()
                .enumerate()
                .map(|(b, &c)| (2f64.powi(b as i32), c))
                .collect();
            let total: u64 = counts.iter().sum();
            match summarize(cells, ValueScale::Log2) {
                None => prop_assert_eq!(total, 0),
                Some(s) => {
                    prop_assert_eq!(s.count, total);
                    prop_assert!(s.min <= s.median && s.median <= s.max);
                    prop_assert!(s.min <= s.mean + 1e-9 && s.mean <= s.max + 1e-9);
                }
            }
        }
    }
}
