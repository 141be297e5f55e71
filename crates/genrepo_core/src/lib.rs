//! Generic repository layer over SQLite.
//!
//! Entity-specific repositories get CRUD and named-query operations by
//! aliasing or wrapping `GenericRepository` with their entity type.

pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod unit;

pub use rusqlite;

pub use db::migrations::Migration;
pub use db::{DbError, DbResult};
pub use engine::sqlite::{SqliteSession, SqliteSessionFactory};
pub use engine::{QueryParam, Session, SessionFactory};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityDescriptor, EntityValidationError};
pub use repo::contract::{RepoError, RepoResult, Repository};
pub use repo::generic_repo::GenericRepository;
pub use repo::scoped::ScopedSession;
pub use unit::{DatabaseLocation, NamedQuery, PersistenceUnit, UnitConfig, DEFAULT_BUSY_TIMEOUT};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
