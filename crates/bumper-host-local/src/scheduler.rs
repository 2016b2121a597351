//! Durable wake-up table
//!
//! Wake-ups are rows in `wakeups`, one per subject. Nothing fires on its own:
//! the service loop drains due rows with [`SqliteScheduler::take_due`] on
//! every tick, so a wake-up scheduled before a restart still fires after it.

use bumper_host_api::{HostResult, Scheduler, WakeUp};
use bumper_util::SubjectId;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::db::{db_error, lock, open_connection};

pub struct SqliteScheduler {
    conn: Mutex<Connection>,
}

impl SqliteScheduler {
    /// Open or create the wake-up table at the given path
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> HostResult<Self> {
        let conn = open_connection(path.as_ref(), busy_timeout)?;
        let scheduler = Self {
            conn: Mutex::new(conn),
        };
        scheduler.init_schema()?;
        Ok(scheduler)
    }

    /// Create an in-memory wake-up table (for testing)
    pub fn in_memory() -> HostResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        let scheduler = Self {
            conn: Mutex::new(conn),
        };
        scheduler.init_schema()?;
        Ok(scheduler)
    }

    fn init_schema(&self) -> HostResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS wakeups (
                subject_id TEXT PRIMARY KEY,
                fire_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_wakeups_fire_at ON wakeups(fire_at);
            "#,
        )
        .map_err(db_error)?;
        Ok(())
    }

    /// Remove and return every wake-up due at `now`, earliest first.
    ///
    /// Selection and removal happen in one immediate transaction, so two
    /// pollers never both receive the same row.
    pub fn take_due(&self, now: DateTime<Utc>) -> HostResult<Vec<WakeUp>> {
        let mut conn = lock(&self.conn)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_error)?;

        let due = {
            let mut stmt = tx
                .prepare(
                    "SELECT subject_id, fire_at FROM wakeups
                     WHERE fire_at <= ? ORDER BY fire_at, subject_id",
                )
                .map_err(db_error)?;
            let rows = stmt
                .query_map([now.timestamp()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(db_error)?;
            collect_wakeups(rows)?
        };

        tx.execute("DELETE FROM wakeups WHERE fire_at <= ?", [now.timestamp()])
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;

        if !due.is_empty() {
            debug!(count = due.len(), "Wake-ups came due");
        }
        Ok(due)
    }

    /// Every pending wake-up, earliest first
    pub fn pending(&self) -> HostResult<Vec<WakeUp>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare("SELECT subject_id, fire_at FROM wakeups ORDER BY fire_at, subject_id")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_error)?;
        collect_wakeups(rows)
    }
}

fn collect_wakeups(
    rows: impl Iterator<Item = rusqlite::Result<(String, i64)>>,
) -> HostResult<Vec<WakeUp>> {
    let mut wakeups = Vec::new();
    for row in rows {
        let (subject_id, fire_at) = row.map_err(db_error)?;
        let Some(fire_at) = Utc.timestamp_opt(fire_at, 0).single() else {
            warn!(subject_id, fire_at, "Skipping wake-up with unrepresentable time");
            continue;
        };
        wakeups.push(WakeUp {
            subject_id: SubjectId::new(subject_id),
            fire_at,
        });
    }
    Ok(wakeups)
}

impl Scheduler for SqliteScheduler {
    fn schedule(&self, subject: &SubjectId, at: DateTime<Utc>) -> HostResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO wakeups (subject_id, fire_at)
            VALUES (?, ?)
            ON CONFLICT(subject_id)
            DO UPDATE SET fire_at = excluded.fire_at
            "#,
            params![subject.as_str(), at.timestamp()],
        )
        .map_err(db_error)?;

        debug!(subject_id = %subject, fire_at = %at, "Wake-up scheduled");
        Ok(())
    }

    fn cancel(&self, subject: &SubjectId) -> HostResult<()> {
        let conn = lock(&self.conn)?;
        let removed = conn
            .execute("DELETE FROM wakeups WHERE subject_id = ?", [subject.as_str()])
            .map_err(db_error)?;

        if removed > 0 {
            debug!(subject_id = %subject, "Wake-up cancelled");
        }
        Ok(())
    }
}
