//! Property-based tests for delta accumulation.

use proptest::prelude::*;
use tl_common::{MetricFamily, ProbeId, ResultFamily};
use tl_config::NegativeDeltaPolicy;
use tl_core::DeltaAccumulator;

/// A nondecreasing sequence of cumulative snapshots of `width` cells.
fn cumulative_series(width: usize) -> impl Strategy<Value = Vec<Vec<u64>>> {
    (
        prop::collection::vec(0u64..1_000, width),
        prop::collection::vec(prop::collection::vec(0u64..1_000, width), 0..8),
    )
        .prop_map(|(start, increments)| {
            let mut series = vec![start];
            for inc in increments {
                let last = series.last().cloned().unwrap_or_default();
                series.push(last.iter().zip(&inc).map(|(a, b)| a + b).collect());
            }
            series
        })
}

fn family_strategy() -> impl Strategy<Value = MetricFamily> {
    prop_oneof![
        Just(MetricFamily::Latency),
        Just(MetricFamily::Result(ResultFamily::Success)),
        Just(MetricFamily::Result(ResultFamily::FeeCharged)),
        Just(MetricFamily::Result(ResultFamily::NoFee)),
    ]
}

fn add(acc: &mut [u64], delta: &[u64]) {
    for (a, d) in acc.iter_mut().zip(delta) {
        *a += d;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Baseline plus every interval delta sums to the last snapshot, and
    /// the deltas after the baseline sum to last minus first.
    #[test]
    fn deltas_telescope(
        (family, series) in family_strategy()
            .prop_flat_map(|f| (Just(f), cumulative_series(f.width()))),
    ) {
        let width = family.width();
        let mut acc = DeltaAccumulator::new(NegativeDeltaPolicy::Skip);
        let mut total = vec![0u64; width];
        let mut after_baseline = vec![0u64; width];
        for (i, snapshot) in series.iter().enumerate() {
            let delta = acc
                .compute_delta(family, ProbeId(1), snapshot)
                .unwrap()
                .unwrap();
            add(&mut total, &delta);
            if i > 0 {
                add(&mut after_baseline, &delta);
            }
        }

        let first = &series[0];
        let last = series.last().unwrap();
        prop_assert_eq!(&total, last);
        let expected: Vec<u64> = last.iter().zip(first).map(|(l, f)| l - f).collect();
        prop_assert_eq!(after_baseline, expected);
        prop_assert!(acc.anomalies().is_empty());
    }

    /// A decrease anywhere is always recorded, whatever the policy.
    #[test]
    fn regressions_are_never_silent(
        base in prop::collection::vec(1u64..1_000, 64),
        cell in 0usize..64,
        rebaseline in any::<bool>(),
    ) {
        let policy = if rebaseline {
            NegativeDeltaPolicy::Rebaseline
        } else {
            NegativeDeltaPolicy::Skip
        };
        let mut acc = DeltaAccumulator::new(policy);
        acc.compute_delta(MetricFamily::Latency, ProbeId(1), &base).unwrap();

        let mut lowered = base.clone();
        lowered[cell] -= 1;
        let delta = acc.compute_delta(MetricFamily::Latency, ProbeId(1), &lowered).unwrap();

        prop_assert_eq!(acc.anomalies().len(), 1);
        prop_assert_eq!(&acc.anomalies()[0].cells, &vec![cell]);
        match policy {
            NegativeDeltaPolicy::Skip => {
                prop_assert_eq!(delta, None);
            }
            NegativeDeltaPolicy::Rebaseline => {
                prop_assert_eq!(delta, Some(lowered));
            }
        }
    }
}
