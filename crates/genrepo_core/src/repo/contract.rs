//! Repository capability contract and error taxonomy.
//!
//! # Responsibility
//! - Declare the CRUD and named-query operations every repository offers.
//! - Classify failures so callers can tell absence from breakage.
//!
//! # Invariants
//! - Absent rows are `Ok(None)` or an empty `Vec`, never an error.
//! - A `Transaction` error means the mutation was rolled back.

use crate::db::DbError;
use crate::model::entity::EntityValidationError;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Repository construction rejected its entity mapping.
    Configuration(String),
    /// Entity failed `Entity::validate()`; nothing was written.
    Validation(EntityValidationError),
    /// A unit-of-work session could not be opened.
    Connectivity(DbError),
    /// Begin, write or commit failed; the transaction was rolled back.
    Transaction {
        operation: &'static str,
        source: DbError,
    },
    /// A read failed, including unknown or mismatched named queries.
    Query(DbError),
    /// Mutation targeted a key with no stored row.
    NotFound { entity: &'static str, key: String },
    /// Single-result query matched more than one row. `count` is the number of
    /// rows read before the lookup stopped, not the full match count.
    NonUniqueResult { query: String, count: usize },
}

impl RepoError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::Connectivity(_) => "connectivity",
            Self::Transaction { .. } => "transaction",
            Self::Query(_) => "query",
            Self::NotFound { .. } => "not_found",
            Self::NonUniqueResult { .. } => "non_unique",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "repository misconfigured: {message}"),
            Self::Validation(err) => write!(f, "entity rejected: {err}"),
            Self::Connectivity(err) => write!(f, "cannot open session: {err}"),
            Self::Transaction { operation, source } => {
                write!(f, "{operation} rolled back: {source}")
            }
            Self::Query(err) => write!(f, "query failed: {err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: {key}"),
            Self::NonUniqueResult { query, count } => {
                write!(
                    f,
                    "named query `{query}` matched at least {count} rows, expected one"
                )
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Connectivity(err) => Some(err),
            Self::Transaction { source, .. } => Some(source),
            Self::Query(err) => Some(err),
            Self::Configuration(_) => None,
            Self::NotFound { .. } => None,
            Self::NonUniqueResult { .. } => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Operations offered by every repository over key `K` and entity `E`.
///
/// `value` arguments accept text as well as any other SQLite value
/// (integer, real, blob, null).
pub trait Repository<K, E> {
    /// Inserts a new entity.
    fn save(&self, entity: &E) -> RepoResult<()>;
    /// Updates the entity with the same key, inserting it when absent.
    fn merge(&self, entity: &E) -> RepoResult<()>;
    /// Deletes the entity with the same key.
    fn remove(&self, entity: &E) -> RepoResult<()>;
    fn get_by_id(&self, key: &K) -> RepoResult<Option<E>>;
    /// Returns every stored entity, in no particular order.
    fn get_all(&self) -> RepoResult<Vec<E>>;
    fn get_all_named_query(&self, name: &str) -> RepoResult<Vec<E>>;
    /// Runs a one-parameter named query expected to match at most one row.
    fn get_unique_by_restriction(
        &self,
        name: &str,
        param: &str,
        value: impl Into<Value>,
    ) -> RepoResult<Option<E>>;
    fn get_by_restriction(
        &self,
        name: &str,
        param: &str,
        value: impl Into<Value>,
    ) -> RepoResult<Vec<E>>;
}
