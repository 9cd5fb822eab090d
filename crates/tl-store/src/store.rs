//! The collection database handle and its sparse writers.
//!
//! One `HistogramStore` owns one SQLite connection. The sampling loop keeps
//! a single writable handle for the whole run; readers open their own
//! read-only handle per reconstruction, and WAL journaling lets them read
//! committed intervals while the writer is active.

use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tl_common::{ProbeId, Timestamp};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::rows::{
    encode_latency, encode_results, storable, IntervalSample, ProbeRecord, ResultDeltas,
    TransactionRecord,
};
use crate::schema::{self, TableName};

/// How long a connection waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const INSERT_TIMING: &str = "INSERT INTO timings VALUES (?1, ?2, ?3, ?4);";
const INSERT_TER: &str = "INSERT INTO ters VALUES (?1, ?2, ?3, ?4);";

/// Handle on a collection database.
#[derive(Debug)]
pub struct HistogramStore {
    pub(crate) conn: Connection,
    path: PathBuf,
    probe_ids: HashSet<ProbeId>,
}

impl HistogramStore {
    /// Open a database for writing, creating the schema when the file is new.
    ///
    /// Only a database without any schema objects counts as new; it is
    /// seeded with `probes`. Anything else must already carry the full
    /// schema and every probe in `probes`, and is left untouched otherwise.
    pub fn create_or_open(path: impl AsRef<Path>, probes: &[ProbeRecord]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let fresh = schema::is_empty(&conn).map_err(|e| StoreError::InvalidStore {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if fresh {
            info!(path = %path.display(), "creating db tables");
            let tx = conn.transaction()?;
            schema::create_schema(&tx, probes)?;
            tx.commit()?;
        }

        let store = Self::from_connection(conn, path)?;
        for probe in probes {
            if !store.probe_ids.contains(&probe.id) {
                return Err(StoreError::UnknownProbe(probe.id));
            }
        }
        store
            .conn
            .query_row("PRAGMA journal_mode=WAL;", [], |row| row.get::<_, String>(0))?;
        Ok(store)
    }

    /// Open an existing database read-only.
    ///
    /// Fails with [`StoreError::InvalidStore`] if the file cannot be opened
    /// or lacks any table of the schema.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::InvalidStore {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn, path)
    }

    fn from_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        let missing = schema::missing_tables(&conn).map_err(|e| StoreError::InvalidStore {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|t| t.as_str()).collect();
            return Err(StoreError::InvalidStore {
                path,
                reason: format!("missing tables: {}", names.join(", ")),
            });
        }

        let probe_ids = {
            let mut stmt = conn.prepare("SELECT id FROM probes;")?;
            let ids = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            ids.map(|id| id.map(ProbeId))
                .collect::<std::result::Result<HashSet<_>, _>>()?
        };

        Ok(Self {
            conn,
            path,
            probe_ids,
        })
    }

    /// Path this store was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All probes, ordered by id.
    pub fn probes(&self) -> Result<Vec<ProbeRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, description FROM probes ORDER BY id;")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProbeRecord {
                id: ProbeId(row.get(0)?),
                description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn check_probe(&self, probe_id: ProbeId) -> Result<()> {
        if self.probe_ids.contains(&probe_id) {
            Ok(())
        } else {
            Err(StoreError::UnknownProbe(probe_id))
        }
    }

    /// Append the nonzero cells of a latency delta.
    pub fn write_latency(&mut self, probe_id: ProbeId, ts: Timestamp, delta: &[u64]) -> Result<usize> {
        self.write_interval(&IntervalSample {
            probe_id,
            timestamp: ts,
            latency: Some(delta.to_vec()),
            results: None,
        })
    }

    /// Append the nonzero cells of a result-code delta.
    pub fn write_result(
        &mut self,
        probe_id: ProbeId,
        ts: Timestamp,
        deltas: &ResultDeltas,
    ) -> Result<usize> {
        self.write_interval(&IntervalSample {
            probe_id,
            timestamp: ts,
            latency: None,
            results: Some(deltas.clone()),
        })
    }

    /// Append one probe's interval, all families in a single transaction.
    ///
    /// Encoding happens before the transaction starts, so an unencodable
    /// cell leaves nothing behind. Returns the number of rows written.
    pub fn write_interval(&mut self, sample: &IntervalSample) -> Result<usize> {
        self.check_probe(sample.probe_id)?;

        let timings = match &sample.latency {
            Some(delta) => encode_latency(delta)?,
            None => Vec::new(),
        };
        let ters = match &sample.results {
            Some(deltas) => encode_results(deltas)?,
            None => Vec::new(),
        };
        if timings.is_empty() && ters.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_TIMING)?;
            for (log_bin, counts) in &timings {
                stmt.execute(params![sample.probe_id.0, sample.timestamp.0, log_bin, counts])?;
            }
            let mut stmt = tx.prepare_cached(INSERT_TER)?;
            for (ter, counts) in &ters {
                stmt.execute(params![sample.probe_id.0, sample.timestamp.0, ter, counts])?;
            }
        }
        tx.commit()?;

        let written = timings.len() + ters.len();
        debug!(
            probe = %sample.probe_id,
            timestamp = sample.timestamp.0,
            timings = timings.len(),
            ters = ters.len(),
            "interval written"
        );
        Ok(written)
    }

    /// Append one exact-trace transaction row.
    pub fn add_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO transactions (id, timestamp, duration, type, ter) \
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                record.id.to_hex(),
                record.timestamp.0,
                storable(record.duration_ns)?,
                record.tx_type,
                record.result
            ],
        )?;
        Ok(())
    }
}
