//! Named persistence units.
//!
//! # Responsibility
//! - Bind a unit name to a database location and connection settings.
//! - Hold entity mapping metadata and the named query registry.
//! - Keep unit migrations in strictly increasing order.
//!
//! # Invariants
//! - Entity names and named query names are unique within a unit.
//! - Every named query must target an entity registered before the unit is
//!   bound to a session factory.

mod config;

pub use config::UnitConfig;

use crate::db::migrations::{latest_version, Migration};
use crate::db::{DbError, DbResult};
use crate::model::entity::EntityDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Busy timeout applied when a unit does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the unit's database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatabaseLocation {
    File { path: PathBuf },
    /// Private in-memory database kept alive by the bound session factory.
    Memory,
}

/// Query registered under a stable name for one entity type.
///
/// `sql` must select every mapped column of `entity` and may declare one
/// named parameter (`:param`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub entity: String,
    pub sql: String,
}

impl NamedQuery {
    pub fn new(name: impl Into<String>, entity: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            sql: sql.into(),
        }
    }
}

/// Named persistence configuration consumed by a session factory.
#[derive(Debug, Clone)]
pub struct PersistenceUnit {
    name: String,
    location: DatabaseLocation,
    busy_timeout: Duration,
    migrations: Vec<Migration>,
    entities: BTreeMap<&'static str, EntityDescriptor>,
    named_queries: BTreeMap<String, NamedQuery>,
}

impl PersistenceUnit {
    pub fn new(name: impl Into<String>, location: DatabaseLocation) -> DbResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DbError::InvalidUnit("unit name cannot be empty".to_string()));
        }

        Ok(Self {
            name,
            location,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            migrations: Vec::new(),
            entities: BTreeMap::new(),
            named_queries: BTreeMap::new(),
        })
    }

    /// Builds a unit from a parsed configuration document.
    ///
    /// Entities are not part of the document and must be registered afterwards.
    pub fn from_config(config: UnitConfig) -> DbResult<Self> {
        let mut unit = Self::new(config.name, config.database)?;
        if let Some(timeout_ms) = config.busy_timeout_ms {
            unit = unit.with_busy_timeout(Duration::from_millis(timeout_ms));
        }
        for migration in config.migrations {
            unit.add_migration(migration)?;
        }
        for query in config.named_queries {
            unit.register_named_query(query)?;
        }
        Ok(unit)
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Appends one schema migration.
    ///
    /// # Errors
    /// - Returns `InvalidUnit` when `version` does not exceed the latest one.
    pub fn add_migration(&mut self, migration: Migration) -> DbResult<()> {
        let latest = latest_version(&self.migrations);
        if migration.version <= latest {
            return Err(DbError::InvalidUnit(format!(
                "migration version {} must be greater than {latest}",
                migration.version
            )));
        }
        self.migrations.push(migration);
        Ok(())
    }

    /// Registers entity mapping metadata.
    pub fn register_entity(&mut self, descriptor: EntityDescriptor) -> DbResult<()> {
        descriptor.check().map_err(DbError::InvalidUnit)?;
        if self.entities.contains_key(descriptor.name) {
            return Err(DbError::InvalidUnit(format!(
                "entity already registered: {}",
                descriptor.name
            )));
        }
        self.entities.insert(descriptor.name, descriptor);
        Ok(())
    }

    /// Registers one named query.
    pub fn register_named_query(&mut self, query: NamedQuery) -> DbResult<()> {
        let name = query.name.trim();
        if name.is_empty() {
            return Err(DbError::InvalidUnit(
                "named query name cannot be empty".to_string(),
            ));
        }
        if query.sql.trim().is_empty() {
            return Err(DbError::InvalidUnit(format!(
                "named query `{name}` has empty sql"
            )));
        }
        if self.named_queries.contains_key(name) {
            return Err(DbError::InvalidUnit(format!(
                "named query already registered: {name}"
            )));
        }

        let name = name.to_string();
        self.named_queries.insert(
            name.clone(),
            NamedQuery {
                name,
                entity: query.entity.trim().to_string(),
                sql: query.sql,
            },
        );
        Ok(())
    }

    /// Checks cross-references between named queries and entities.
    pub fn verify(&self) -> DbResult<()> {
        for query in self.named_queries.values() {
            if !self.entities.contains_key(query.entity.as_str()) {
                return Err(DbError::InvalidUnit(format!(
                    "named query `{}` targets unregistered entity `{}`",
                    query.name, query.entity
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    pub fn named_query(&self, name: &str) -> Option<&NamedQuery> {
        self.named_queries.get(name)
    }
}
