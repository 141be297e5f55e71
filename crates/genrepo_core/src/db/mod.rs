//! SQLite connection bootstrap, schema migrations and engine errors.
//!
//! # Responsibility
//! - Open and configure SQLite connections for a persistence unit.
//! - Apply unit migrations in deterministic order.
//! - Define the error type shared by every engine primitive.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Sessions are never handed out before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_connection, ConnectionTarget};

pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by the persistence engine and its configuration.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Persistence unit definition is inconsistent.
    InvalidUnit(String),
    /// Unit configuration file could not be read or parsed.
    Config(String),
    /// Operation attempted on a session after `close()`.
    SessionClosed,
    TransactionAlreadyActive,
    NoActiveTransaction,
    NamedQueryNotFound(String),
    NamedQueryEntityMismatch {
        query: String,
        expected: String,
        actual: String,
    },
    /// Entity produced a different number of values than its mapped columns.
    ColumnCountMismatch {
        entity: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidUnit(message) => write!(f, "invalid persistence unit: {message}"),
            Self::Config(message) => write!(f, "invalid unit configuration: {message}"),
            Self::SessionClosed => write!(f, "session is closed"),
            Self::TransactionAlreadyActive => write!(f, "transaction already active"),
            Self::NoActiveTransaction => write!(f, "no active transaction"),
            Self::NamedQueryNotFound(name) => write!(f, "named query not registered: {name}"),
            Self::NamedQueryEntityMismatch {
                query,
                expected,
                actual,
            } => write!(
                f,
                "named query `{query}` is registered for entity `{actual}`, not `{expected}`"
            ),
            Self::ColumnCountMismatch {
                entity,
                expected,
                actual,
            } => write!(
                f,
                "entity `{entity}` produced {actual} values for {expected} mapped columns"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
