//! SQLite-backed privilege registry

use bumper_host_api::{HostResult, PrivilegeToggle};
use bumper_util::SubjectId;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::{db_error, lock, open_connection};

/// Registry of subjects holding the elevated privilege.
///
/// Stands in for the host's own list of super administrators; other tools
/// may add or remove rows independently of any grant.
pub struct SqlitePrivileges {
    conn: Mutex<Connection>,
}

impl SqlitePrivileges {
    /// Open or create the registry at the given path
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> HostResult<Self> {
        let conn = open_connection(path.as_ref(), busy_timeout)?;
        let registry = Self {
            conn: Mutex::new(conn),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    /// Create an in-memory registry (for testing)
    pub fn in_memory() -> HostResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        let registry = Self {
            conn: Mutex::new(conn),
        };
        registry.init_schema()?;
        Ok(registry)
    }

    fn init_schema(&self) -> HostResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS elevated_subjects (
                subject_id TEXT PRIMARY KEY,
                granted_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(db_error)?;
        Ok(())
    }
}

impl PrivilegeToggle for SqlitePrivileges {
    fn grant(&self, subject: &SubjectId) -> HostResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO elevated_subjects (subject_id, granted_at) VALUES (?, ?)",
            params![subject.as_str(), bumper_util::now().timestamp()],
        )
        .map_err(db_error)?;

        info!(subject_id = %subject, "Privilege granted");
        Ok(())
    }

    fn revoke(&self, subject: &SubjectId) -> HostResult<()> {
        let conn = lock(&self.conn)?;
        let removed = conn
            .execute(
                "DELETE FROM elevated_subjects WHERE subject_id = ?",
                [subject.as_str()],
            )
            .map_err(db_error)?;

        if removed > 0 {
            info!(subject_id = %subject, "Privilege revoked");
        } else {
            debug!(subject_id = %subject, "Privilege already absent");
        }
        Ok(())
    }

    fn is_elevated(&self, subject: &SubjectId) -> HostResult<bool> {
        let conn = lock(&self.conn)?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM elevated_subjects WHERE subject_id = ?",
                [subject.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        Ok(found.is_some())
    }
}
