//! Bucket index types and their storage encodings.
//!
//! Two histogram families are persisted:
//!
//! ```text
//! timings.log_bin   LogBucket      0..=63      bucket b covers [2^b, 2^(b+1)) usec
//! ters.ter          ResultBucket   signed      0 success
//!                                              100 + i   fee-charged family, index i
//!                                              -i        no-fee family, index i (i >= 1)
//! ```
//!
//! The result encoding places all three families in one signed column
//! without collisions: the stored value is the result code the probe
//! observed. Values in `1..=99` are never produced by the encoder and are
//! rejected when decoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of log2 latency buckets per probe.
pub const LATENCY_BUCKETS: usize = 64;

/// Width of the success counter array.
pub const SUCCESS_CELLS: usize = 1;

/// Width of the fee-charged failure counter array.
pub const FEE_CHARGED_CELLS: usize = 51;

/// Width of the no-fee failure counter array.
pub const NO_FEE_CELLS: usize = 400;

/// Offset added to a fee-charged family index in storage.
pub const FEE_CHARGED_OFFSET: i64 = 100;

/// Errors from bucket construction or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketError {
    #[error("log bucket {0} out of range 0..64")]
    LogBucketOutOfRange(i64),

    #[error("{family} index {index} out of range 0..{width}")]
    IndexOutOfRange {
        family: ResultFamily,
        index: usize,
        width: usize,
    },

    #[error("no-fee index 0 collides with the success bucket")]
    NoFeeIndexZero,

    #[error("stored result bucket {0} does not decode to any family")]
    Undecodable(i64),
}

/// One cell of the power-of-two latency histogram, indexed by exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct LogBucket(u8);

impl LogBucket {
    /// Build from an array index or stored `log_bin`.
    pub fn new(index: i64) -> Result<Self, BucketError> {
        if (0..LATENCY_BUCKETS as i64).contains(&index) {
            Ok(LogBucket(index as u8))
        } else {
            Err(BucketError::LogBucketOutOfRange(index))
        }
    }

    /// All buckets in ascending order.
    pub fn all() -> impl Iterator<Item = LogBucket> {
        (0..LATENCY_BUCKETS as u8).map(LogBucket)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Representative value `2^b`.
    ///
    /// Stored reports call this the bucket's right edge. Bucket 0 maps to 1,
    /// not to the geometric mean of the interval.
    pub fn value(self) -> u64 {
        1u64 << self.0
    }

    /// `log2(value())`, i.e. the exponent as a float.
    pub fn log2_value(self) -> f64 {
        self.0 as f64
    }
}

impl TryFrom<i64> for LogBucket {
    type Error = BucketError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        LogBucket::new(value)
    }
}

impl From<LogBucket> for i64 {
    fn from(bucket: LogBucket) -> Self {
        bucket.0 as i64
    }
}

/// The three result-code counter families sampled per probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFamily {
    /// Operation applied successfully.
    Success,
    /// Recoverable failure, fee charged.
    FeeCharged,
    /// Not applied, no fee.
    NoFee,
}

impl ResultFamily {
    pub const ALL: [ResultFamily; 3] = [
        ResultFamily::Success,
        ResultFamily::FeeCharged,
        ResultFamily::NoFee,
    ];

    /// Fixed counter array width for this family.
    pub fn width(self) -> usize {
        match self {
            ResultFamily::Success => SUCCESS_CELLS,
            ResultFamily::FeeCharged => FEE_CHARGED_CELLS,
            ResultFamily::NoFee => NO_FEE_CELLS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResultFamily::Success => "success",
            ResultFamily::FeeCharged => "fee_charged",
            ResultFamily::NoFee => "no_fee",
        }
    }
}

impl fmt::Display for ResultFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A result-code histogram cell, tagged with its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResultBucket {
    Success,
    FeeCharged(u16),
    NoFee(u16),
}

impl ResultBucket {
    /// Build from a family and an index into that family's counter array.
    pub fn from_family_index(family: ResultFamily, index: usize) -> Result<Self, BucketError> {
        let width = family.width();
        if index >= width {
            return Err(BucketError::IndexOutOfRange {
                family,
                index,
                width,
            });
        }
        match family {
            ResultFamily::Success => Ok(ResultBucket::Success),
            ResultFamily::FeeCharged => Ok(ResultBucket::FeeCharged(index as u16)),
            ResultFamily::NoFee if index == 0 => Err(BucketError::NoFeeIndexZero),
            ResultFamily::NoFee => Ok(ResultBucket::NoFee(index as u16)),
        }
    }

    pub fn family(self) -> ResultFamily {
        match self {
            ResultBucket::Success => ResultFamily::Success,
            ResultBucket::FeeCharged(_) => ResultFamily::FeeCharged,
            ResultBucket::NoFee(_) => ResultFamily::NoFee,
        }
    }

    /// Index into the family's counter array.
    pub fn family_index(self) -> usize {
        match self {
            ResultBucket::Success => 0,
            ResultBucket::FeeCharged(i) | ResultBucket::NoFee(i) => i as usize,
        }
    }

    /// Value stored in `ters.ter`.
    pub fn encode(self) -> i64 {
        match self {
            ResultBucket::Success => 0,
            ResultBucket::FeeCharged(i) => FEE_CHARGED_OFFSET + i as i64,
            ResultBucket::NoFee(i) => -(i as i64),
        }
    }

    /// Inverse of [`ResultBucket::encode`].
    pub fn decode(stored: i64) -> Result<Self, BucketError> {
        match stored {
            0 => Ok(ResultBucket::Success),
            v if v >= FEE_CHARGED_OFFSET => {
                let index = (v - FEE_CHARGED_OFFSET) as usize;
                Self::from_family_index(ResultFamily::FeeCharged, index)
                    .map_err(|_| BucketError::Undecodable(stored))
            }
            v if v < 0 => {
                let index = v.unsigned_abs() as usize;
                Self::from_family_index(ResultFamily::NoFee, index)
                    .map_err(|_| BucketError::Undecodable(stored))
            }
            _ => Err(BucketError::Undecodable(stored)),
        }
    }
}

/// A sampled metric family: the latency histogram or one result family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Latency,
    Result(ResultFamily),
}

impl MetricFamily {
    /// Fixed snapshot width for this family.
    pub fn width(self) -> usize {
        match self {
            MetricFamily::Latency => LATENCY_BUCKETS,
            MetricFamily::Result(family) => family.width(),
        }
    }
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricFamily::Latency => f.write_str("latency"),
            MetricFamily::Result(family) => write!(f, "result/{family}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn log_bucket_bounds() {
        assert!(LogBucket::new(0).is_ok());
        assert!(LogBucket::new(63).is_ok());
        assert_eq!(
            LogBucket::new(64),
            Err(BucketError::LogBucketOutOfRange(64))
        );
        assert!(LogBucket::new(-1).is_err());
    }

    #[test]
    fn log_bucket_value_is_power_of_two() {
        assert_eq!(LogBucket::new(0).unwrap().value(), 1);
        assert_eq!(LogBucket::new(1).unwrap().value(), 2);
        assert_eq!(LogBucket::new(10).unwrap().value(), 1024);
        assert_eq!(LogBucket::new(63).unwrap().value(), 1u64 << 63);
        assert_eq!(LogBucket::new(5).unwrap().log2_value(), 5.0);
    }

    #[test]
    fn result_encoding_matches_storage_convention() {
        let fee = ResultBucket::from_family_index(ResultFamily::FeeCharged, 3).unwrap();
        assert_eq!(fee.encode(), 103);
        let no_fee = ResultBucket::from_family_index(ResultFamily::NoFee, 2).unwrap();
        assert_eq!(no_fee.encode(), -2);
        let ok = ResultBucket::from_family_index(ResultFamily::Success, 0).unwrap();
        assert_eq!(ok.encode(), 0);

        assert_eq!(ResultBucket::decode(103), Ok(fee));
        assert_eq!(ResultBucket::decode(-2), Ok(no_fee));
        assert_eq!(ResultBucket::decode(0), Ok(ok));
    }

    #[test]
    fn result_decode_rejects_reserved_gap() {
        for v in 1..FEE_CHARGED_OFFSET {
            assert_eq!(ResultBucket::decode(v), Err(BucketError::Undecodable(v)));
        }
        let past_fee = FEE_CHARGED_OFFSET + FEE_CHARGED_CELLS as i64;
        assert!(ResultBucket::decode(past_fee).is_err());
        assert!(ResultBucket::decode(-(NO_FEE_CELLS as i64)).is_err());
    }

    #[test]
    fn no_fee_index_zero_is_rejected() {
        assert_eq!(
            ResultBucket::from_family_index(ResultFamily::NoFee, 0),
            Err(BucketError::NoFeeIndexZero)
        );
    }

    #[test]
    fn family_index_bounds() {
        let err = ResultBucket::from_family_index(ResultFamily::Success, 1).unwrap_err();
        assert!(matches!(err, BucketError::IndexOutOfRange { width: 1, .. }));
        assert!(ResultBucket::from_family_index(ResultFamily::FeeCharged, 51).is_err());
    }

    #[test]
    fn log_bucket_serde_uses_plain_integer() {
        let json = serde_json::to_string(&LogBucket::new(7).unwrap()).unwrap();
        assert_eq!(json, "7");
        assert!(serde_json::from_str::<LogBucket>("64").is_err());
    }

    proptest! {
        #[test]
        fn result_bucket_decode_inverts_encode(family_idx in 0usize..3, index in 0usize..400) {
            let family = ResultFamily::ALL[family_idx];
            if let Ok(bucket) = ResultBucket::from_family_index(family, index) {
                prop_assert_eq!(ResultBucket::decode(bucket.encode()), Ok(bucket));
                prop_assert_eq!(bucket.family(), family);
                prop_assert_eq!(bucket.family_index(), index);
            }
        }
    }
}
