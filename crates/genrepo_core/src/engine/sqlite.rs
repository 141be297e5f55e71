//! SQLite implementation of the engine capability.
//!
//! # Responsibility
//! - Bind a persistence unit once: open, configure and migrate its database.
//! - Hand out independent sessions that run generated or named SQL.
//!
//! # Invariants
//! - Generated SQL only interpolates descriptor identifiers that passed
//!   `EntityDescriptor::check()`; every value is bound.
//! - Write transactions start with `BEGIN IMMEDIATE`.
//! - In-memory units stay alive exactly as long as their factory.

use crate::db::migrations::apply_migrations;
use crate::db::{open_connection, ConnectionTarget, DbError, DbResult};
use crate::engine::{QueryParam, Session, SessionFactory};
use crate::model::entity::{Entity, EntityDescriptor};
use crate::unit::{DatabaseLocation, PersistenceUnit};
use log::{debug, error, info};
use rusqlite::types::{ToSql, Value};
use rusqlite::{params, params_from_iter, Connection, Rows};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

/// Session factory bound to one persistence unit.
pub struct SqliteSessionFactory {
    unit: Arc<PersistenceUnit>,
    target: ConnectionTarget,
    schema_version: u32,
    // Anchors shared in-memory databases; never used for queries.
    _keepalive: Option<Mutex<Connection>>,
}

impl SqliteSessionFactory {
    /// Binds `unit`: verifies its registry, then opens and migrates its database.
    ///
    /// # Errors
    /// - `InvalidUnit` when a named query targets an unregistered entity.
    /// - `UnsupportedSchemaVersion` when the database is newer than the unit.
    /// - `Sqlite` when opening or migrating fails.
    pub fn bind(unit: PersistenceUnit) -> DbResult<Self> {
        let started_at = Instant::now();
        unit.verify()?;

        let target = match unit.location() {
            DatabaseLocation::File { path } => ConnectionTarget::File(path.clone()),
            DatabaseLocation::Memory => {
                ConnectionTarget::SharedMemory(format!("genrepo-{}", Uuid::new_v4().simple()))
            }
        };

        let mut conn = open_connection(&target, unit.busy_timeout())?;
        let schema_version = match apply_migrations(&mut conn, unit.migrations()) {
            Ok(version) => version,
            Err(err) => {
                error!(
                    "event=factory_bind module=engine status=error unit={} duration_ms={} error={}",
                    unit.name(),
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        let keepalive = match &target {
            ConnectionTarget::SharedMemory(_) => Some(Mutex::new(conn)),
            ConnectionTarget::File(_) => None,
        };

        info!(
            "event=factory_bind module=engine status=ok unit={} schema_version={} duration_ms={}",
            unit.name(),
            schema_version,
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            unit: Arc::new(unit),
            target,
            schema_version,
            _keepalive: keepalive,
        })
    }

    /// Schema version reached when the unit was bound.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

impl SessionFactory for SqliteSessionFactory {
    type Session = SqliteSession;

    fn unit_name(&self) -> &str {
        self.unit.name()
    }

    fn mapping(&self, entity: &str) -> Option<&EntityDescriptor> {
        self.unit.entity(entity)
    }

    fn open_session(&self) -> DbResult<SqliteSession> {
        let conn = open_connection(&self.target, self.unit.busy_timeout())?;
        debug!(
            "event=session_open module=engine status=ok unit={}",
            self.unit.name()
        );
        Ok(SqliteSession {
            conn: Some(conn),
            unit: Arc::clone(&self.unit),
            opened_at: Instant::now(),
        })
    }
}

/// One SQLite connection acting as a unit-of-work handle.
pub struct SqliteSession {
    conn: Option<Connection>,
    unit: Arc<PersistenceUnit>,
    opened_at: Instant,
}

impl SqliteSession {
    /// Raw connection for repository-specific statements.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::SessionClosed)
    }
}

impl Session for SqliteSession {
    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn begin(&mut self) -> DbResult<()> {
        if self.is_transaction_active() {
            return Err(DbError::TransactionAlreadyActive);
        }
        self.connection()?.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        if !self.is_transaction_active() {
            return Err(DbError::NoActiveTransaction);
        }
        self.connection()?.execute_batch("COMMIT;")?;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.is_transaction_active() {
            return Err(DbError::NoActiveTransaction);
        }
        self.connection()?.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.conn.as_ref().is_some_and(|conn| !conn.is_autocommit())
    }

    fn insert<E: Entity>(&mut self, descriptor: &EntityDescriptor, entity: &E) -> DbResult<()> {
        let values = checked_values(descriptor, entity)?;
        self.connection()?
            .execute(&insert_sql(descriptor), params_from_iter(values))?;
        Ok(())
    }

    fn upsert<E: Entity>(&mut self, descriptor: &EntityDescriptor, entity: &E) -> DbResult<()> {
        let values = checked_values(descriptor, entity)?;
        self.connection()?
            .execute(&upsert_sql(descriptor), params_from_iter(values))?;
        Ok(())
    }

    fn delete<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        entity: &E,
    ) -> DbResult<usize> {
        let changed = self
            .connection()?
            .execute(&delete_sql(descriptor), params![entity.key()])?;
        Ok(changed)
    }

    fn find<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        key: &E::Key,
    ) -> DbResult<Option<E>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&find_sql(descriptor))?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(E::from_row(row)?));
        }
        Ok(None)
    }

    fn select_all<E: Entity>(&mut self, descriptor: &EntityDescriptor) -> DbResult<Vec<E>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&select_all_sql(descriptor))?;
        let rows = stmt.query([])?;
        collect_entities(rows, None)
    }

    fn named_query<E: Entity>(
        &mut self,
        descriptor: &EntityDescriptor,
        name: &str,
        param: Option<&QueryParam>,
        limit: Option<usize>,
    ) -> DbResult<Vec<E>> {
        let query = self
            .unit
            .named_query(name)
            .ok_or_else(|| DbError::NamedQueryNotFound(name.to_string()))?;
        if query.entity != descriptor.name {
            return Err(DbError::NamedQueryEntityMismatch {
                query: query.name.clone(),
                expected: descriptor.name.to_string(),
                actual: query.entity.clone(),
            });
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&query.sql)?;
        let rows = match param {
            None => stmt.query([])?,
            Some(param) => {
                let bound = [(param.name(), param.value() as &dyn ToSql)];
                stmt.query(&bound[..])?
            }
        };
        collect_entities(rows, limit)
    }

    fn table_columns(&mut self, table: &str) -> DbResult<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
        let mut rows = stmt.query([table])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push(row.get(0)?);
        }
        Ok(columns)
    }

    fn close(&mut self) -> DbResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                debug!(
                    "event=session_close module=engine status=ok unit={} held_ms={}",
                    self.unit.name(),
                    self.opened_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err((_conn, err)) => {
                error!(
                    "event=session_close module=engine status=error unit={} error={}",
                    self.unit.name(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

fn checked_values<E: Entity>(descriptor: &EntityDescriptor, entity: &E) -> DbResult<Vec<Value>> {
    let values = entity.to_values();
    if values.len() != descriptor.columns.len() {
        return Err(DbError::ColumnCountMismatch {
            entity: descriptor.name,
            expected: descriptor.columns.len(),
            actual: values.len(),
        });
    }
    Ok(values)
}

fn collect_entities<E: Entity>(mut rows: Rows<'_>, limit: Option<usize>) -> DbResult<Vec<E>> {
    let mut entities = Vec::new();
    while limit.map_or(true, |limit| entities.len() < limit) {
        let Some(row) = rows.next()? else {
            break;
        };
        entities.push(E::from_row(row)?);
    }
    Ok(entities)
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn insert_sql(descriptor: &EntityDescriptor) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        descriptor.table,
        descriptor.column_list(),
        placeholders(descriptor.columns.len())
    )
}

fn upsert_sql(descriptor: &EntityDescriptor) -> String {
    let assignments = descriptor
        .value_columns()
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>();
    let conflict_action = if assignments.is_empty() {
        "NOTHING".to_string()
    } else {
        format!("UPDATE SET {}", assignments.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO {};",
        descriptor.table,
        descriptor.column_list(),
        placeholders(descriptor.columns.len()),
        descriptor.key_column,
        conflict_action
    )
}

fn delete_sql(descriptor: &EntityDescriptor) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?1;",
        descriptor.table, descriptor.key_column
    )
}

fn find_sql(descriptor: &EntityDescriptor) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = ?1;",
        descriptor.column_list(),
        descriptor.table,
        descriptor.key_column
    )
}

fn select_all_sql(descriptor: &EntityDescriptor) -> String {
    format!(
        "SELECT {} FROM {};",
        descriptor.column_list(),
        descriptor.table
    )
}
