//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or process-shared in-memory SQLite connections.
//! - Configure connection pragmas required by repository behavior.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections honor the unit busy timeout.

use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Resolved place a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// SQLite database file.
    File(PathBuf),
    /// Named in-memory database on the `memdb` VFS, shared by every connection
    /// in the process. Lives while one connection to it stays open.
    ///
    /// `memdb` takes file-style locks, so contention surfaces as `SQLITE_BUSY`
    /// and waits on the busy timeout like a file database.
    SharedMemory(String),
}

impl ConnectionTarget {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::SharedMemory(_) => "memory",
        }
    }
}

/// Opens one configured connection to `target`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(target: &ConnectionTarget, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();

    let opened = match target {
        ConnectionTarget::File(path) => Connection::open(path),
        ConnectionTarget::SharedMemory(name) => {
            Connection::open(format!("file:/{name}?vfs=memdb"))
        }
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_connection(&conn, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_configure_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
