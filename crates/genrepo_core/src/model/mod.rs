//! Entity mapping model shared by the engine and repositories.
//!
//! # Responsibility
//! - Define the record contract every persisted entity type implements.
//! - Describe table mappings without reflection.
//!
//! # Invariants
//! - Every entity is identified by a key bound against one key column.

pub mod entity;
