//! JSON configuration documents for persistence units.

use crate::db::migrations::Migration;
use crate::db::{DbError, DbResult};
use crate::unit::{DatabaseLocation, NamedQuery};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File form of a persistence unit.
///
/// ```json
/// {
///   "name": "site",
///   "database": { "kind": "file", "path": "/var/lib/site.sqlite3" },
///   "busy_timeout_ms": 2000,
///   "migrations": [{ "version": 1, "sql": "CREATE TABLE ..." }],
///   "named_queries": [{ "name": "Person.byCity", "entity": "Person", "sql": "..." }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitConfig {
    pub name: String,
    pub database: DatabaseLocation,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    #[serde(default)]
    pub migrations: Vec<Migration>,
    #[serde(default)]
    pub named_queries: Vec<NamedQuery>,
}

impl UnitConfig {
    pub fn from_json_str(raw: &str) -> DbResult<Self> {
        serde_json::from_str(raw).map_err(|err| DbError::Config(err.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| DbError::Config(format!("cannot read `{}`: {err}", path.display())))?;
        Self::from_json_str(&raw)
    }
}
