//! Shared SQLite plumbing for the local adapters

use bumper_host_api::{HostError, HostResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub(crate) fn db_error(e: rusqlite::Error) -> HostError {
    HostError::Database(e.to_string())
}

pub(crate) fn open_connection(path: &Path, busy_timeout: Duration) -> HostResult<Connection> {
    let conn = Connection::open(path).map_err(db_error)?;
    conn.busy_timeout(busy_timeout).map_err(db_error)?;
    Ok(conn)
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> HostResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| HostError::Internal("connection lock poisoned".into()))
}
