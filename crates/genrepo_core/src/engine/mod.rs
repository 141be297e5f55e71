//! Persistence engine capability consumed by repositories.
//!
//! # Responsibility
//! - Define the narrow session/factory interface repositories depend on.
//! - Keep engine-specific SQL behind that interface.
//!
//! # Invariants
//! - A closed session rejects every primitive with `DbError::SessionClosed`.
//! - `close()` is idempotent.
//! - Factories are shareable across threads; sessions are not.

pub mod sqlite;

use crate::db::DbResult;
use crate::model::entity::{Entity, EntityDescriptor};
use rusqlite::types::Value;

/// Unit-of-work handle: one open connection to the engine.
pub trait Session {
    fn is_open(&self) -> bool;

    fn begin(&mut self) -> DbResult<()>;
    fn commit(&mut self) -> DbResult<()>;
    fn rollback(&mut self) -> DbResult<()>;
    fn is_transaction_active(&self) -> bool;

    fn insert<E: Entity>(&mut self, descriptor: &EntityDescriptor, entity: &E) -> DbResult<()>;
    /// Updates the row with the entity key, inserting it when absent.
    fn upsert<E: Entity>(&mut self, descriptor: &EntityDescriptor, entity: &E) -> DbResult<()>;
    /// Deletes the row with the entity key and returns the affected row count.
    fn delete<E: Entity>(&mut self, descriptor: &EntityDescriptor, entity: &E)
        -> DbResult<usize>;

    fn find<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        key: &E::Key,
    ) -> DbResult<Option<E>>;
    fn select_all<E: Entity>(&mut self, descriptor: &EntityDescriptor) -> DbResult<Vec<E>>;
    /// Runs a registered named query with zero or one bound parameter.
    ///
    /// Stops reading rows once `limit` entities have been collected.
    fn named_query<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        name: &str,
        param: Option<&QueryParam>,
        limit: Option<usize>,
    ) -> DbResult<Vec<E>>;

    /// Lists column names of `table`; empty when the table does not exist.
    fn table_columns(&mut self, table: &str) -> DbResult<Vec<String>>;

    fn close(&mut self) -> DbResult<()>;
}

/// Process-level source of sessions bound to one persistence unit.
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    fn unit_name(&self) -> &str;

    /// Returns mapping metadata registered for `entity`.
    fn mapping(&self, entity: &str) -> Option<&EntityDescriptor>;

    fn open_session(&self) -> DbResult<Self::Session>;
}

/// One named parameter bound to a named query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    name: String,
    value: Value,
}

impl QueryParam {
    /// Creates a parameter; bare names get a `:` prefix.
    pub fn new(name: &str, value: impl Into<Value>) -> Self {
        let name = name.trim();
        let name = if name.starts_with([':', '@', '$']) {
            name.to_string()
        } else {
            format!(":{name}")
        };
        Self {
            name,
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}
