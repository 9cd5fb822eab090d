//! Window readers for the statistics reconstructor.
//!
//! Every reader selects rows with `start <= timestamp <= end`.

use rusqlite::params;
use tl_common::{LogBucket, ProbeId, Timestamp, TxId};

use crate::error::{Result, StoreError};
use crate::rows::{LatencyRow, ResultRow, TimeWindow, TransactionRecord};
use crate::store::HistogramStore;

fn count_from(table: &'static str, raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| StoreError::MalformedRow {
        table,
        reason: format!("negative count {raw}"),
    })
}

impl HistogramStore {
    /// Latency rows in the window, ordered by timestamp, probe, bucket.
    pub fn latency_rows_in(&self, window: TimeWindow) -> Result<Vec<LatencyRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT probe_id, timestamp, log_bin, counts FROM timings \
             WHERE timestamp >= ?1 AND timestamp <= ?2 \
             ORDER BY timestamp, probe_id, log_bin;",
        )?;
        let raw = stmt.query_map(params![window.start.0, window.end.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut rows = Vec::new();
        for item in raw {
            let (probe_id, timestamp, log_bin, counts) = item?;
            rows.push(LatencyRow {
                probe_id: ProbeId(probe_id),
                timestamp: Timestamp(timestamp),
                bucket: LogBucket::new(log_bin)?,
                count: count_from("timings", counts)?,
            });
        }
        Ok(rows)
    }

    /// Result-code rows in the window, ordered by timestamp, probe, code.
    ///
    /// Codes are returned as stored. Callers that need the family decode
    /// with [`ResultRow::bucket`].
    pub fn result_rows_in(&self, window: TimeWindow) -> Result<Vec<ResultRow>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT probe_id, timestamp, ter, counts FROM ters \
             WHERE timestamp >= ?1 AND timestamp <= ?2 \
             ORDER BY timestamp, probe_id, ter;",
        )?;
        let raw = stmt.query_map(params![window.start.0, window.end.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut rows = Vec::new();
        for item in raw {
            let (probe_id, timestamp, code, counts) = item?;
            rows.push(ResultRow {
                probe_id: ProbeId(probe_id),
                timestamp: Timestamp(timestamp),
                code,
                count: count_from("ters", counts)?,
            });
        }
        Ok(rows)
    }

    /// Exact-trace transactions in the window, ordered by timestamp.
    pub fn transactions_in(&self, window: TimeWindow) -> Result<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, type, timestamp, duration, ter FROM transactions \
             WHERE timestamp >= ?1 AND timestamp <= ?2 \
             ORDER BY timestamp, rowid;",
        )?;
        let raw = stmt.query_map(params![window.start.0, window.end.0], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for item in raw {
            let (id, tx_type, timestamp, duration, result) = item?;
            let malformed = |reason: String| StoreError::MalformedRow {
                table: "transactions",
                reason,
            };
            records.push(TransactionRecord {
                id: TxId::from_hex(&id).ok_or_else(|| malformed(format!("id {id}")))?,
                tx_type: u32::try_from(tx_type)
                    .map_err(|_| malformed(format!("type {tx_type}")))?,
                timestamp: Timestamp(timestamp),
                duration_ns: count_from("transactions", duration)?,
                result: i32::try_from(result)
                    .map_err(|_| malformed(format!("ter {result}")))?,
            });
        }
        Ok(records)
    }
}
