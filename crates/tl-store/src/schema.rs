//! Persisted table definitions.
//!
//! Column names and types are a durable contract: reporting tools outside
//! this workspace read these tables directly.

use rusqlite::{params, Connection, Transaction};
use std::fmt;

use crate::error::Result;
use crate::rows::ProbeRecord;

/// Tables of the collection database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    Probes,
    Collections,
    Timings,
    Ters,
    Tags,
    Transactions,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::Probes,
        TableName::Collections,
        TableName::Timings,
        TableName::Ters,
        TableName::Tags,
        TableName::Transactions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Probes => "probes",
            TableName::Collections => "collections",
            TableName::Timings => "timings",
            TableName::Ters => "ters",
            TableName::Tags => "tags",
            TableName::Transactions => "transactions",
        }
    }

    /// `CREATE TABLE` statement for this table.
    pub fn ddl(&self) -> &'static str {
        match self {
            TableName::Probes => {
                "CREATE TABLE probes (id INTEGER PRIMARY KEY ASC, description TEXT);"
            }
            TableName::Collections => {
                "CREATE TABLE collections (id INTEGER PRIMARY KEY ASC, \
                 start INTEGER, end INTEGER, git_commit TEXT);"
            }
            TableName::Timings => {
                "CREATE TABLE timings (probe_id INTEGER, timestamp INTEGER, \
                 log_bin INTEGER, counts INTEGER);"
            }
            TableName::Ters => {
                "CREATE TABLE ters (probe_id INTEGER, timestamp INTEGER, \
                 ter INTEGER, counts INTEGER);"
            }
            TableName::Tags => "CREATE TABLE tags (collection_id INTEGER, tag TEXT);",
            TableName::Transactions => {
                "CREATE TABLE transactions (id CHARACTER(64), type INTEGER, \
                 timestamp INTEGER, duration INTEGER, ter INTEGER);"
            }
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TRANSACTION_ID_INDEX: &str = "CREATE INDEX IdIndex ON transactions (id);";

/// Whether a table with this name exists.
pub(crate) fn table_exists(conn: &Connection, table: TableName) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1;",
        params![table.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether the database holds no schema objects at all.
pub(crate) fn is_empty(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT count(*) FROM sqlite_master;", [], |row| row.get(0))?;
    Ok(count == 0)
}

/// Tables of the schema that are absent from the database.
pub(crate) fn missing_tables(conn: &Connection) -> Result<Vec<TableName>> {
    let mut missing = Vec::new();
    for table in TableName::ALL {
        if !table_exists(conn, table)? {
            missing.push(table);
        }
    }
    Ok(missing)
}

/// Create every table and seed the probe enumeration.
pub(crate) fn create_schema(tx: &Transaction<'_>, probes: &[ProbeRecord]) -> Result<()> {
    for table in TableName::ALL {
        tx.execute_batch(table.ddl())?;
    }
    tx.execute_batch(TRANSACTION_ID_INDEX)?;

    let mut stmt = tx.prepare("INSERT INTO probes VALUES (?1, ?2);")?;
    for probe in probes {
        stmt.execute(params![probe.id.0, probe.description])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_common::ProbeId;

    #[test]
    fn table_names_match_contract() {
        let names: Vec<&str> = TableName::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec!["probes", "collections", "timings", "ters", "tags", "transactions"]
        );
        for table in TableName::ALL {
            assert!(table.ddl().contains(table.as_str()));
        }
    }

    #[test]
    fn create_schema_creates_all_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(missing_tables(&conn).unwrap().len(), 6);

        let tx = conn.transaction().unwrap();
        create_schema(
            &tx,
            &[ProbeRecord {
                id: ProbeId(3),
                description: "three".to_string(),
            }],
        )
        .unwrap();
        tx.commit().unwrap();

        assert!(missing_tables(&conn).unwrap().is_empty());
        let description: String = conn
            .query_row("SELECT description FROM probes WHERE id = 3;", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(description, "three");
        let index_count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='index' AND name='IdIndex';",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);
    }
}
