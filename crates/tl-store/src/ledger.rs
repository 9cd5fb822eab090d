//! Collection ledger: brackets a sampling run with start and end timestamps.
//!
//! ```text
//! open(build_id, tags) ──► [open: end IS NULL] ──► close(id, end) ──► [closed]
//! ```
//!
//! A collection whose process died before `close` keeps a NULL end and is
//! never queryable. Closing twice, or closing an unknown id, is an error.

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tl_common::{CollectionId, Timestamp};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::rows::TimeWindow;
use crate::store::HistogramStore;

/// A row of the `collections` table with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub id: CollectionId,
    pub start: Timestamp,
    pub end: Option<Timestamp>,
    pub build_id: String,
    pub tags: Vec<String>,
}

impl CollectionRecord {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// The inclusive window of a closed collection.
    pub fn window(&self) -> Option<TimeWindow> {
        self.end.map(|end| TimeWindow {
            start: self.start,
            end,
        })
    }

    /// Short menu label: `<id>: <start date>`.
    pub fn label(&self) -> String {
        format!("{}: {}", self.id, self.start.format_utc())
    }
}

/// Ledger operations over a store's `collections` and `tags` tables.
pub struct CollectionLedger<'a> {
    store: &'a mut HistogramStore,
}

impl HistogramStore {
    /// Ledger view of this store.
    pub fn ledger(&mut self) -> CollectionLedger<'_> {
        CollectionLedger { store: self }
    }
}

const SELECT_COLLECTION: &str = "SELECT id, start, end, git_commit FROM collections";

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<CollectionRecord> {
    Ok(CollectionRecord {
        id: CollectionId(row.get(0)?),
        start: Timestamp(row.get(1)?),
        end: row.get::<_, Option<i64>>(2)?.map(Timestamp),
        build_id: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        tags: Vec::new(),
    })
}

impl CollectionLedger<'_> {
    /// Open a collection starting now.
    pub fn open(&mut self, build_id: &str, tags: &[String]) -> Result<CollectionId> {
        self.open_at(Timestamp::now(), build_id, tags)
    }

    /// Open a collection with an explicit start.
    pub fn open_at(
        &mut self,
        start: Timestamp,
        build_id: &str,
        tags: &[String],
    ) -> Result<CollectionId> {
        let tx = self.store.conn.transaction()?;
        tx.execute(
            "INSERT INTO collections (start, end, git_commit) VALUES (?1, NULL, ?2);",
            params![start.0, build_id],
        )?;
        let id = CollectionId(tx.last_insert_rowid());
        {
            let mut stmt = tx.prepare("INSERT INTO tags VALUES (?1, ?2);")?;
            for tag in tags {
                stmt.execute(params![id.0, tag])?;
            }
        }
        tx.commit()?;

        info!(collection = %id, start = start.0, build_id, tags = tags.len(), "collection opened");
        Ok(id)
    }

    /// Close an open collection.
    pub fn close(&mut self, id: CollectionId, end: Timestamp) -> Result<()> {
        let record = self.get(id)?;
        if let Some(existing) = record.end {
            return Err(StoreError::AlreadyClosed { id, end: existing });
        }
        if end < record.start {
            return Err(StoreError::EndBeforeStart {
                id,
                start: record.start,
                end,
            });
        }

        let updated = self.store.conn.execute(
            "UPDATE collections SET end = ?1 WHERE id = ?2 AND end IS NULL;",
            params![end.0, id.0],
        )?;
        if updated != 1 {
            return Err(StoreError::CollectionNotFound(id));
        }

        info!(collection = %id, end = end.0, "collection closed");
        Ok(())
    }

    /// Look up one collection with its tags.
    pub fn get(&self, id: CollectionId) -> Result<CollectionRecord> {
        let record = self
            .store
            .conn
            .query_row(
                &format!("{SELECT_COLLECTION} WHERE id = ?1;"),
                params![id.0],
                collection_from_row,
            )
            .optional()?
            .ok_or(StoreError::CollectionNotFound(id))?;
        self.with_tags(record)
    }

    /// All collections ordered by start.
    pub fn list(&self) -> Result<Vec<CollectionRecord>> {
        let records = {
            let mut stmt = self
                .store
                .conn
                .prepare(&format!("{SELECT_COLLECTION} ORDER BY start, id;"))?;
            let rows = stmt.query_map([], collection_from_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        records.into_iter().map(|r| self.with_tags(r)).collect()
    }

    /// The most recently started collection; ties go to the highest id.
    pub fn latest(&self) -> Result<CollectionRecord> {
        let record = self
            .store
            .conn
            .query_row(
                &format!("{SELECT_COLLECTION} ORDER BY start DESC, id DESC LIMIT 1;"),
                [],
                collection_from_row,
            )
            .optional()?
            .ok_or(StoreError::NoCollections)?;
        self.with_tags(record)
    }

    fn with_tags(&self, mut record: CollectionRecord) -> Result<CollectionRecord> {
        let mut stmt = self
            .store
            .conn
            .prepare_cached("SELECT tag FROM tags WHERE collection_id = ?1 ORDER BY rowid;")?;
        let tags = stmt.query_map(params![record.id.0], |row| {
            row.get::<_, Option<String>>(0)
        })?;
        record.tags = tags
            .filter_map(|tag| tag.transpose())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::ProbeRecord;
    use tempfile::TempDir;
    use tl_common::ProbeId;

    fn store(dir: &TempDir) -> HistogramStore {
        HistogramStore::create_or_open(
            dir.path().join("probes.db"),
            &[ProbeRecord {
                id: ProbeId(1),
                description: "payment".to_string(),
            }],
        )
        .unwrap()
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn open_then_close() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        let mut ledger = store.ledger();

        let id = ledger
            .open_at(Timestamp(100), "abc123", &tags(&["v1.2", "bench"]))
            .unwrap();
        let open = ledger.get(id).unwrap();
        assert!(open.is_open());
        assert_eq!(open.window(), None);
        assert_eq!(open.build_id, "abc123");
        assert_eq!(open.tags, tags(&["v1.2", "bench"]));

        ledger.close(id, Timestamp(160)).unwrap();
        let closed = ledger.get(id).unwrap();
        assert_eq!(
            closed.window(),
            Some(TimeWindow {
                start: Timestamp(100),
                end: Timestamp(160)
            })
        );
    }

    #[test]
    fn close_twice_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        let mut ledger = store.ledger();
        let id = ledger.open_at(Timestamp(10), "c", &[]).unwrap();
        ledger.close(id, Timestamp(20)).unwrap();
        let err = ledger.close(id, Timestamp(30)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyClosed {
                end: Timestamp(20),
                ..
            }
        ));
    }

    #[test]
    fn close_unknown_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        let err = store
            .ledger()
            .close(CollectionId(77), Timestamp(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(CollectionId(77))));
    }

    #[test]
    fn close_before_start_fails() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        let mut ledger = store.ledger();
        let id = ledger.open_at(Timestamp(50), "c", &[]).unwrap();
        let err = ledger.close(id, Timestamp(49)).unwrap_err();
        assert!(matches!(err, StoreError::EndBeforeStart { .. }));
        // Still open and closable.
        ledger.close(id, Timestamp(50)).unwrap();
    }

    #[test]
    fn latest_orders_by_start_then_id() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir);
        let mut ledger = store.ledger();
        assert!(matches!(ledger.latest(), Err(StoreError::NoCollections)));

        let late = ledger.open_at(Timestamp(300), "a", &[]).unwrap();
        let early = ledger.open_at(Timestamp(100), "b", &[]).unwrap();
        assert_eq!(ledger.latest().unwrap().id, late);

        let tied = ledger.open_at(Timestamp(300), "c", &[]).unwrap();
        assert_eq!(ledger.latest().unwrap().id, tied);

        let ids: Vec<CollectionId> = ledger.list().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![early, late, tied]);
    }

    #[test]
    fn label_formats_start() {
        let record = CollectionRecord {
            id: CollectionId(3),
            start: Timestamp(0),
            end: None,
            build_id: String::new(),
            tags: Vec::new(),
        };
        assert_eq!(record.label(), "3: 1970-01-01 00:00:00");
    }
}
