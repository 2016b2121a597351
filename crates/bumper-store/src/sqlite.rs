//! SQLite-based store implementation

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{GrantMap, GrantStore, GrantTransaction, StoreError, StoreResult};

/// Default name of the record holding every grant
pub const DEFAULT_GRANTS_OPTION: &str = "bumper_grants";

/// SQLite-based grant store.
///
/// Grants live as one JSON document in the `options` table, under a single
/// well-known name. Writers take an in-process mutex and then an immediate
/// SQLite transaction, so writers in other processes are excluded too.
pub struct SqliteGrantStore {
    conn: Mutex<Connection>,
    option_name: String,
}

impl SqliteGrantStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers proceed while a writer holds the lock
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        let store = Self {
            conn: Mutex::new(conn),
            option_name: DEFAULT_GRANTS_OPTION.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            option_name: DEFAULT_GRANTS_OPTION.to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Keep grants under a different record name
    pub fn with_option_name(mut self, option_name: impl Into<String>) -> Self {
        self.option_name = option_name.into();
        self
    }

    pub fn option_name(&self) -> &str {
        &self.option_name
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Named records; grants are one row
            CREATE TABLE IF NOT EXISTS options (
                option_name TEXT PRIMARY KEY,
                option_value TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn read_grants(conn: &Connection, option_name: &str) -> StoreResult<GrantMap> {
    let json: Option<String> = conn
        .query_row(
            "SELECT option_value FROM options WHERE option_name = ?",
            [option_name],
            |row| row.get(0),
        )
        .optional()?;

    let Some(json) = json else {
        return Ok(GrantMap::new());
    };

    match serde_json::from_str::<GrantMap>(&json) {
        Ok(grants) => Ok(grants),
        Err(e) => {
            warn!(option_name, error = %e, "Stored grants are corrupt, treating as empty");
            Ok(GrantMap::new())
        }
    }
}

fn write_grants(conn: &Connection, option_name: &str, grants: &GrantMap) -> StoreResult<()> {
    let json = serde_json::to_string(grants)?;

    conn.execute(
        r#"
        INSERT INTO options (option_name, option_value)
        VALUES (?, ?)
        ON CONFLICT(option_name)
        DO UPDATE SET option_value = excluded.option_value
        "#,
        params![option_name, json],
    )?;

    debug!(option_name, grant_count = grants.len(), "Grants written");
    Ok(())
}

impl GrantStore for SqliteGrantStore {
    fn get_all(&self) -> StoreResult<GrantMap> {
        let conn = self.lock()?;
        read_grants(&conn, &self.option_name)
    }

    fn put_all(&self, grants: &GrantMap) -> StoreResult<()> {
        let mut txn = self.begin()?;
        txn.put_all(grants)?;
        txn.commit()
    }

    fn begin(&self) -> StoreResult<Box<dyn GrantTransaction + '_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;

        Ok(Box::new(SqliteTransaction {
            conn,
            option_name: &self.option_name,
            finished: false,
        }))
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

/// Open immediate transaction on the store's connection
struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    option_name: &'a str,
    finished: bool,
}

impl GrantTransaction for SqliteTransaction<'_> {
    fn get_all(&self) -> StoreResult<GrantMap> {
        read_grants(&self.conn, self.option_name)
    }

    fn put_all(&mut self, grants: &GrantMap) -> StoreResult<()> {
        write_grants(&self.conn, self.option_name, grants)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "Failed to roll back grant transaction");
        } else {
            debug!("Grant transaction rolled back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Grant;
    use bumper_util::SubjectId;
    use chrono::{TimeZone, Utc};

    fn grant(subject: &str, minutes: i64) -> Grant {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Grant::new(
            SubjectId::new(subject),
            Some(SubjectId::new("1")),
            start,
            chrono::Duration::minutes(minutes),
        )
    }

    fn map_of(grants: &[Grant]) -> GrantMap {
        grants
            .iter()
            .map(|g| (g.subject_id.clone(), g.clone()))
            .collect()
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteGrantStore::in_memory().unwrap();
        assert!(store.is_healthy());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_put_all_replaces_collection() {
        let store = SqliteGrantStore::in_memory().unwrap();

        store.put_all(&map_of(&[grant("alice", 30), grant("bob", 10)])).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 2);

        store.put_all(&map_of(&[grant("carol", 5)])).unwrap();
        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&SubjectId::new("carol")], grant("carol", 5));
    }

    #[test]
    fn test_corrupt_record_reads_as_empty() {
        let store = SqliteGrantStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO options (option_name, option_value) VALUES (?, ?)",
                params![DEFAULT_GRANTS_OPTION, "{not json"],
            )
            .unwrap();
        }

        assert!(store.get_all().unwrap().is_empty());

        // A later write repairs the record
        store.put_all(&map_of(&[grant("alice", 30)])).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_transaction_commit() {
        let store = SqliteGrantStore::in_memory().unwrap();

        let mut txn = store.begin().unwrap();
        txn.put_all(&map_of(&[grant("alice", 30)])).unwrap();
        assert_eq!(txn.get_all().unwrap().len(), 1);
        txn.commit().unwrap();

        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let store = SqliteGrantStore::in_memory().unwrap();
        store.put_all(&map_of(&[grant("alice", 30)])).unwrap();

        {
            let mut txn = store.begin().unwrap();
            txn.put_all(&GrantMap::new()).unwrap();
        }

        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&SubjectId::new("alice")));
    }

    #[test]
    fn test_option_name_scopes_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.db");

        let a = SqliteGrantStore::open(&path, Duration::from_secs(1)).unwrap();
        let b = SqliteGrantStore::open(&path, Duration::from_secs(1))
            .unwrap()
            .with_option_name("other_grants");

        a.put_all(&map_of(&[grant("alice", 30)])).unwrap();
        assert!(b.get_all().unwrap().is_empty());
        assert_eq!(b.option_name(), "other_grants");
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.db");

        {
            let store = SqliteGrantStore::open(&path, Duration::from_secs(1)).unwrap();
            store.put_all(&map_of(&[grant("alice", 30)])).unwrap();
        }

        let store = SqliteGrantStore::open(&path, Duration::from_secs(1)).unwrap();
        assert_eq!(store.get_all().unwrap()[&SubjectId::new("alice")], grant("alice", 30));
    }

    #[test]
    fn test_second_writer_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.db");

        // Two connections stand in for two processes
        let first = SqliteGrantStore::open(&path, Duration::from_millis(50)).unwrap();
        let second = SqliteGrantStore::open(&path, Duration::from_millis(50)).unwrap();

        let txn = first.begin().unwrap();
        let result = second.begin();
        assert!(matches!(result, Err(StoreError::Busy(_))));

        drop(txn);
        assert!(second.begin().is_ok());
    }
}
