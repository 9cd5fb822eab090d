//! Dense histogram matrices built from sparse rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tl_common::{ProbeId, Timestamp};

/// Row-major `rows x cols` matrix of counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Add `count` to a cell. Out-of-bounds cells are ignored and reported.
    pub fn add(&mut self, row: usize, col: usize, count: u64) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        let cell = &mut self.data[row * self.cols + col];
        *cell = cell.saturating_add(count);
        true
    }

    /// One row as a slice.
    pub fn row(&self, row: usize) -> &[u64] {
        let start = (row * self.cols).min(self.data.len());
        let end = (start + self.cols).min(self.data.len());
        &self.data[start..end]
    }

    /// Sum of every column of each row; the global histogram of a local one.
    pub fn row_sums(&self) -> Vec<u64> {
        (0..self.rows).map(|r| self.row(r).iter().sum()).collect()
    }
}

/// A histogram with leading and trailing zero bins removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trimmed {
    /// Label (bucket index or result code) of `bins[0]`.
    pub first: i64,
    pub bins: Vec<u64>,
}

impl Trimmed {
    /// `(label, count)` pairs of the kept bins.
    pub fn labelled(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.bins
            .iter()
            .enumerate()
            .map(move |(i, &c)| (self.first + i as i64, c))
    }
}

/// Trim zeros from both ends of `bins`, whose first label is `first_label`.
///
/// Returns `None` if every bin is zero.
pub fn trim(bins: &[u64], first_label: i64) -> Option<Trimmed> {
    let lo = bins.iter().position(|&c| c != 0)?;
    let hi = bins.iter().rposition(|&c| c != 0)?;
    Some(Trimmed {
        first: first_label + lo as i64,
        bins: bins[lo..=hi].to_vec(),
    })
}

/// Sorted distinct timestamps of one probe; the column index of a local
/// histogram is a timestamp's rank here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampIndex(Vec<Timestamp>);

impl TimestampIndex {
    pub fn from_unsorted(mut timestamps: Vec<Timestamp>) -> Self {
        timestamps.sort_unstable();
        timestamps.dedup();
        Self(timestamps)
    }

    pub fn rank(&self, ts: Timestamp) -> Option<usize> {
        self.0.binary_search(&ts).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.0
    }
}

/// Global and local histograms of one metric family, per probe.
///
/// `global[probe][bin]` sums a probe's counts over the whole window;
/// `local[probe]` is `[bin][timestamp rank]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyHistograms {
    pub bins: usize,
    pub global: BTreeMap<ProbeId, Vec<u64>>,
    pub local: BTreeMap<ProbeId, Matrix>,
    pub timestamps: BTreeMap<ProbeId, TimestampIndex>,
}

impl FamilyHistograms {
    /// Build from `(probe, timestamp, bin, count)` cells in one pass.
    ///
    /// Every probe in `probes` gets a (possibly all-zero) global row.
    /// Cells whose bin is `None` are skipped; their count is returned.
    pub fn build<I>(bins: usize, probes: &[ProbeId], cells: I) -> (Self, u64)
    where
        I: IntoIterator<Item = (ProbeId, Timestamp, Option<usize>, u64)> + Clone,
    {
        let mut by_probe: BTreeMap<ProbeId, Vec<Timestamp>> =
            probes.iter().map(|&p| (p, Vec::new())).collect();
        for (probe, ts, _, _) in cells.clone() {
            by_probe.entry(probe).or_default().push(ts);
        }

        let timestamps: BTreeMap<ProbeId, TimestampIndex> = by_probe
            .into_iter()
            .map(|(p, ts)| (p, TimestampIndex::from_unsorted(ts)))
            .collect();
        let mut global: BTreeMap<ProbeId, Vec<u64>> = timestamps
            .keys()
            .map(|&p| (p, vec![0; bins]))
            .collect();
        let mut local: BTreeMap<ProbeId, Matrix> = timestamps
            .iter()
            .map(|(&p, index)| (p, Matrix::zeros(bins, index.len())))
            .collect();

        let mut skipped = 0u64;
        for (probe, ts, bin, count) in cells {
            let Some(bin) = bin else {
                skipped = skipped.saturating_add(count);
                continue;
            };
            if let (Some(row), Some(matrix), Some(index)) = (
                global.get_mut(&probe),
                local.get_mut(&probe),
                timestamps.get(&probe),
            ) {
                if let (Some(cell), Some(col)) = (row.get_mut(bin), index.rank(ts)) {
                    *cell = cell.saturating_add(count);
                    matrix.add(bin, col, count);
                }
            }
        }

        (
            Self {
                bins,
                global,
                local,
                timestamps,
            },
            skipped,
        )
    }

    /// The global row of `probe` trimmed of zero bins, labelled from
    /// `first_label`.
    pub fn trimmed(&self, probe: ProbeId, first_label: i64) -> Option<Trimmed> {
        trim(self.global.get(&probe)?, first_label)
    }
}
