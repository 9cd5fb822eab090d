//! Probe, collection and transaction identity types.
//!
//! These wrap the integer and text keys of the persisted schema so ids from
//! different tables cannot be mixed up at call sites.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Probe id, the primary key of the `probes` table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ProbeId(pub i64);

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProbeId {
    fn from(id: i64) -> Self {
        ProbeId(id)
    }
}

/// Collection id, the primary key of the `collections` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub i64);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CollectionId {
    fn from(id: i64) -> Self {
        CollectionId(id)
    }
}

/// Wall-clock timestamp in whole seconds since the Unix epoch.
///
/// Every sample written during one interval carries the same resolution as
/// the `start`/`end` columns of its collection, so window comparisons are
/// plain integer comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp())
    }

    /// Render as `YYYY-MM-DD HH:MM:SS` UTC, or the raw seconds when out of range.
    pub fn format_utc(self) -> String {
        chrono::DateTime::from_timestamp(self.0, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction id as reported by the exact-trace path: 32 raw bytes,
/// persisted as 64 upper-case hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(pub [u8; 32]);

impl TxId {
    /// Upper-case hex form used by the `transactions.id` column.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Parse the persisted hex form (either case).
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let raw: [u8; 32] = bytes.try_into().ok()?;
        Some(TxId(raw))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TxId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TxId::from_hex(&s).ok_or_else(|| serde::de::Error::custom("expected 64 hex characters"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_id_hex_is_upper_case() {
        let mut raw = [0u8; 32];
        raw[0] = 0xab;
        raw[31] = 0x0f;
        let id = TxId(raw);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("AB"));
        assert!(hex.ends_with("0F"));
        assert_eq!(TxId::from_hex(&hex), Some(id));
        assert_eq!(TxId::from_hex(&hex.to_lowercase()), Some(id));
    }

    #[test]
    fn test_tx_id_rejects_wrong_length() {
        assert!(TxId::from_hex("ABCD").is_none());
        assert!(TxId::from_hex("zz").is_none());
    }

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp(10) < Timestamp(11));
        assert_eq!(Timestamp(0).format_utc(), "1970-01-01 00:00:00");
    }
}
