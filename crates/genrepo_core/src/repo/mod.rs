//! Repository contract and its generic implementation.
//!
//! # Responsibility
//! - Define the CRUD/named-query contract shared by all entity repositories.
//! - Keep session lifecycle and transaction handling out of caller code.
//!
//! # Invariants
//! - Repository writes must enforce `Entity::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `NonUniqueResult`)
//!   in addition to engine errors.

pub mod contract;
pub mod generic_repo;
pub mod scoped;
