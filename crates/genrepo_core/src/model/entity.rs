//! Entity mapping contract.
//!
//! # Responsibility
//! - Define how a caller-owned record maps to one table row.
//! - Describe the mapped table once so generic statements can be built from it.
//!
//! # Invariants
//! - `Entity::to_values` yields values in `EntityDescriptor::columns` order.
//! - Descriptor identifiers are plain SQL identifiers, never quoted input.

use rusqlite::types::{ToSql, Value};
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Record type persisted through a generic repository.
pub trait Entity: Sized {
    /// Identity key bound against the descriptor key column.
    type Key: ToSql + Debug;

    /// Returns the identity key of this record.
    fn key(&self) -> &Self::Key;

    /// Returns column values in descriptor column order.
    fn to_values(&self) -> Vec<Value>;

    /// Builds a record from a row carrying all descriptor columns by name.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Checks record invariants before any write reaches the engine.
    fn validate(&self) -> Result<(), EntityValidationError> {
        Ok(())
    }
}

/// Rejection raised by `Entity::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityValidationError {
    message: String,
}

impl EntityValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for EntityValidationError {}

/// Runtime description of one entity type and its table mapping.
///
/// Passed explicitly when a repository is constructed and cached for the
/// repository lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Entity name used by named-query registration.
    pub name: &'static str,
    pub table: &'static str,
    pub key_column: &'static str,
    /// Every mapped column, key column included.
    pub columns: &'static [&'static str],
}

impl EntityDescriptor {
    pub const fn new(
        name: &'static str,
        table: &'static str,
        key_column: &'static str,
        columns: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            table,
            key_column,
            columns,
        }
    }

    /// Checks that the descriptor can be turned into SQL safely.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("entity name cannot be empty".to_string());
        }
        for (label, value) in [("table", self.table), ("key column", self.key_column)] {
            if !is_sql_identifier(value) {
                return Err(format!(
                    "entity `{}` has invalid {label} `{value}`",
                    self.name
                ));
            }
        }
        if self.columns.is_empty() {
            return Err(format!("entity `{}` maps no columns", self.name));
        }

        for (index, column) in self.columns.iter().enumerate() {
            if !is_sql_identifier(column) {
                return Err(format!(
                    "entity `{}` has invalid column `{column}`",
                    self.name
                ));
            }
            if self.columns[..index]
                .iter()
                .any(|earlier| earlier.eq_ignore_ascii_case(column))
            {
                return Err(format!(
                    "entity `{}` maps column `{column}` twice",
                    self.name
                ));
            }
        }

        if !self
            .columns
            .iter()
            .any(|column| column.eq_ignore_ascii_case(self.key_column))
        {
            return Err(format!(
                "entity `{}` key column `{}` is not among mapped columns",
                self.name, self.key_column
            ));
        }

        Ok(())
    }

    /// Comma-separated mapped column list.
    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }

    /// Columns other than the key column, in mapped order.
    pub fn value_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(move |column| !column.eq_ignore_ascii_case(self.key_column))
    }
}

fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
