//! Generic repository over any entity mapped in a persistence unit.
//!
//! # Responsibility
//! - Provide the full `Repository` contract for one entity type.
//! - Own per-call session lifecycle and transaction envelopes.
//!
//! # Invariants
//! - Every public operation opens its own session and releases it before
//!   returning, whatever the outcome.
//! - `save`, `merge` and `remove` each run in exactly one transaction that is
//!   committed on success and rolled back on any failure.
//! - Entities are validated before a session is opened for a write.
//! - The descriptor passed at construction is checked once and never changes.

use crate::db::DbError;
use crate::engine::{QueryParam, Session, SessionFactory};
use crate::model::entity::{Entity, EntityDescriptor};
use crate::repo::contract::{RepoError, RepoResult, Repository};
use crate::repo::scoped::ScopedSession;
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Repository for entity `E`, backed by sessions from factory `F`.
///
/// Concrete repositories wrap or alias this type:
///
/// ```ignore
/// pub type PersonRepository = GenericRepository<Person, SqliteSessionFactory>;
/// let people = PersonRepository::new(Arc::clone(&factory), PERSON)?;
/// ```
pub struct GenericRepository<E, F> {
    factory: Arc<F>,
    descriptor: EntityDescriptor,
    _entity: PhantomData<fn() -> E>,
}

impl<E, F> GenericRepository<E, F>
where
    E: Entity,
    F: SessionFactory,
{
    /// Creates a repository for `descriptor`.
    ///
    /// # Errors
    /// - `Configuration` when the descriptor is malformed, not registered in
    ///   the factory's unit, registered with a different mapping, or when its
    ///   table or columns are missing from the database.
    /// - `Connectivity` when no session can be opened to inspect the schema.
    /// - `Query` when the schema inspection itself fails.
    pub fn new(factory: Arc<F>, descriptor: EntityDescriptor) -> RepoResult<Self> {
        descriptor.check().map_err(RepoError::Configuration)?;

        match factory.mapping(descriptor.name) {
            None => {
                return Err(RepoError::Configuration(format!(
                    "entity `{}` is not registered in unit `{}`",
                    descriptor.name,
                    factory.unit_name()
                )));
            }
            Some(registered) if *registered != descriptor => {
                return Err(RepoError::Configuration(format!(
                    "entity `{}` mapping differs from the one registered in unit `{}`",
                    descriptor.name,
                    factory.unit_name()
                )));
            }
            Some(_) => {}
        }

        let repo = Self {
            factory,
            descriptor,
            _entity: PhantomData,
        };
        repo.ensure_table_ready()?;

        info!(
            "event=repo_init module=repo status=ok unit={} entity={} table={}",
            repo.factory.unit_name(),
            descriptor.name,
            descriptor.table
        );
        Ok(repo)
    }

    /// Entity type descriptor cached at construction.
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Opens a guarded session for repository-specific statements.
    ///
    /// The session closes when the guard is dropped or released.
    pub fn session(&self) -> RepoResult<ScopedSession<F::Session>> {
        self.factory
            .open_session()
            .map(ScopedSession::new)
            .map_err(RepoError::Connectivity)
    }

    fn ensure_table_ready(&self) -> RepoResult<()> {
        let mut session = self.session()?;
        let columns = session
            .table_columns(self.descriptor.table)
            .map_err(RepoError::Query);
        session.release();
        let columns = columns?;

        if columns.is_empty() {
            return Err(RepoError::Configuration(format!(
                "entity `{}` requires table `{}`",
                self.descriptor.name, self.descriptor.table
            )));
        }
        for column in self.descriptor.columns {
            // SQLite resolves column names case-insensitively.
            if !columns
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(column))
            {
                return Err(RepoError::Configuration(format!(
                    "entity `{}` requires column `{column}` in table `{}`",
                    self.descriptor.name, self.descriptor.table
                )));
            }
        }
        Ok(())
    }

    fn write<W>(&self, operation: &'static str, entity: &E, work: W) -> RepoResult<()>
    where
        W: FnOnce(&mut F::Session, &EntityDescriptor, &E) -> RepoResult<()>,
    {
        let started_at = Instant::now();
        let result = entity
            .validate()
            .map_err(RepoError::from)
            .and_then(|()| {
                let mut session = self.session()?;
                let outcome = run_in_transaction(&mut *session, operation, |session| {
                    work(session, &self.descriptor, entity)
                });
                session.release();
                outcome
            });
        self.log_outcome(operation, started_at, &result);
        result
    }

    fn read<T, Q>(&self, operation: &'static str, query: Q) -> RepoResult<T>
    where
        Q: FnOnce(&mut F::Session, &EntityDescriptor) -> RepoResult<T>,
    {
        let started_at = Instant::now();
        let result = self.session().and_then(|mut session| {
            let outcome = query(&mut *session, &self.descriptor);
            session.release();
            outcome
        });
        self.log_outcome(operation, started_at, &result);
        result
    }

    fn log_outcome<T>(&self, operation: &'static str, started_at: Instant, result: &RepoResult<T>) {
        match result {
            Ok(_) => debug!(
                "event=repo_{} module=repo status=ok entity={} duration_ms={}",
                operation,
                self.descriptor.name,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=repo_{} module=repo status=error entity={} duration_ms={} error_code={} error={}",
                operation,
                self.descriptor.name,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
    }
}

/// Begins, runs `work` and commits; rolls back when anything fails while a
/// transaction is still active.
fn run_in_transaction<S, W>(session: &mut S, operation: &'static str, work: W) -> RepoResult<()>
where
    S: Session,
    W: FnOnce(&mut S) -> RepoResult<()>,
{
    let result = transact(session, operation, work);
    if result.is_err() && session.is_transaction_active() {
        match session.rollback() {
            Ok(()) => warn!(
                "event=tx_rollback module=repo status=ok operation={}",
                operation
            ),
            Err(err) => error!(
                "event=tx_rollback module=repo status=error operation={} error={}",
                operation, err
            ),
        }
    }
    result
}

fn transact<S, W>(session: &mut S, operation: &'static str, work: W) -> RepoResult<()>
where
    S: Session,
    W: FnOnce(&mut S) -> RepoResult<()>,
{
    let tx_error = |source: DbError| RepoError::Transaction { operation, source };
    session.begin().map_err(tx_error)?;
    work(session)?;
    session.commit().map_err(tx_error)
}

impl<E, F> Repository<E::Key, E> for GenericRepository<E, F>
where
    E: Entity,
    F: SessionFactory,
{
    fn save(&self, entity: &E) -> RepoResult<()> {
        self.write("save", entity, |session, descriptor, entity| {
            session
                .insert(descriptor, entity)
                .map_err(|source| RepoError::Transaction {
                    operation: "save",
                    source,
                })
        })
    }

    fn merge(&self, entity: &E) -> RepoResult<()> {
        self.write("merge", entity, |session, descriptor, entity| {
            session
                .upsert(descriptor, entity)
                .map_err(|source| RepoError::Transaction {
                    operation: "merge",
                    source,
                })
        })
    }

    fn remove(&self, entity: &E) -> RepoResult<()> {
        self.write("remove", entity, |session, descriptor, entity| {
            let changed =
                session
                    .delete(descriptor, entity)
                    .map_err(|source| RepoError::Transaction {
                        operation: "remove",
                        source,
                    })?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    entity: descriptor.name,
                    key: format!("{:?}", entity.key()),
                });
            }
            Ok(())
        })
    }

    fn get_by_id(&self, key: &E::Key) -> RepoResult<Option<E>> {
        self.read("get_by_id", |session, descriptor| {
            session.find(descriptor, key).map_err(RepoError::Query)
        })
    }

    fn get_all(&self) -> RepoResult<Vec<E>> {
        self.read("get_all", |session, descriptor| {
            session.select_all(descriptor).map_err(RepoError::Query)
        })
    }

    fn get_all_named_query(&self, name: &str) -> RepoResult<Vec<E>> {
        self.read("get_all_named_query", |session, descriptor| {
            session
                .named_query(descriptor, name, None, None)
                .map_err(RepoError::Query)
        })
    }

    fn get_unique_by_restriction(
        &self,
        name: &str,
        param: &str,
        value: impl Into<Value>,
    ) -> RepoResult<Option<E>> {
        let param = QueryParam::new(param, value);
        self.read("get_unique_by_restriction", |session, descriptor| {
            // Two rows are enough to tell a unique match from an ambiguous one.
            let mut matches = session
                .named_query(descriptor, name, Some(&param), Some(2))
                .map_err(RepoError::Query)?;
            match matches.len() {
                0 => Ok(None),
                1 => Ok(matches.pop()),
                count => Err(RepoError::NonUniqueResult {
                    query: name.to_string(),
                    count,
                }),
            }
        })
    }

    fn get_by_restriction(
        &self,
        name: &str,
        param: &str,
        value: impl Into<Value>,
    ) -> RepoResult<Vec<E>> {
        let param = QueryParam::new(param, value);
        self.read("get_by_restriction", |session, descriptor| {
            session
                .named_query(descriptor, name, Some(&param), None)
                .map_err(RepoError::Query)
        })
    }
}

impl<E, F> std::fmt::Debug for GenericRepository<E, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericRepository")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
