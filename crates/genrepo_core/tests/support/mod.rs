#![allow(dead_code)]

use genrepo_core::rusqlite::types::Value;
use genrepo_core::rusqlite::Row;
use genrepo_core::{
    DatabaseLocation, Entity, EntityDescriptor, EntityValidationError, GenericRepository,
    Migration, NamedQuery, PersistenceUnit, SqliteSessionFactory,
};
use std::path::Path;
use std::sync::Arc;

pub const PERSON: EntityDescriptor =
    EntityDescriptor::new("Person", "people", "id", &["id", "name", "city"]);
pub const NOTE: EntityDescriptor = EntityDescriptor::new("Note", "notes", "id", &["id", "body"]);

pub type PersonRepository = GenericRepository<Person, SqliteSessionFactory>;
pub type NoteRepository = GenericRepository<Note, SqliteSessionFactory>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub city: Option<String>,
}

impl Person {
    pub fn new(id: i64, name: &str, city: Option<&str>) -> Self {
        Self {
            id,
            name: name.to_string(),
            city: city.map(str::to_string),
        }
    }
}

impl Entity for Person {
    type Key = i64;

    fn key(&self) -> &i64 {
        &self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.id),
            Value::Text(self.name.clone()),
            self.city.clone().map_or(Value::Null, Value::Text),
        ]
    }

    fn from_row(row: &Row<'_>) -> genrepo_core::rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            city: row.get("city")?,
        })
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::new("person name cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub body: String,
}

impl Entity for Note {
    type Key = String;

    fn key(&self) -> &String {
        &self.id
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Text(self.id.clone()), Value::Text(self.body.clone())]
    }

    fn from_row(row: &Row<'_>) -> genrepo_core::rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            body: row.get("body")?,
        })
    }
}

/// Unit with `people` and `notes` tables plus the person named queries.
pub fn site_unit(location: DatabaseLocation) -> PersistenceUnit {
    let mut unit = PersistenceUnit::new("site", location).unwrap();
    unit.add_migration(Migration::new(
        1,
        "CREATE TABLE people (
            id INTEGER PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            city TEXT
        );",
    ))
    .unwrap();
    unit.add_migration(Migration::new(
        2,
        "CREATE TABLE notes (
            id TEXT PRIMARY KEY NOT NULL,
            body TEXT NOT NULL
        );",
    ))
    .unwrap();
    unit.register_entity(PERSON).unwrap();
    unit.register_entity(NOTE).unwrap();

    for (name, sql) in [
        ("Person.all", "SELECT id, name, city FROM people ORDER BY id"),
        (
            "Person.byCity",
            "SELECT id, name, city FROM people WHERE city = :city ORDER BY id",
        ),
        (
            "Person.byName",
            "SELECT id, name, city FROM people WHERE name = :name",
        ),
        (
            "Person.idAbove",
            "SELECT id, name, city FROM people WHERE id > :id ORDER BY id",
        ),
    ] {
        unit.register_named_query(NamedQuery::new(name, "Person", sql))
            .unwrap();
    }
    unit.register_named_query(NamedQuery::new(
        "Note.all",
        "Note",
        "SELECT id, body FROM notes",
    ))
    .unwrap();
    unit
}

pub fn memory_factory() -> Arc<SqliteSessionFactory> {
    Arc::new(SqliteSessionFactory::bind(site_unit(DatabaseLocation::Memory)).unwrap())
}

pub fn file_factory(path: &Path) -> Arc<SqliteSessionFactory> {
    let location = DatabaseLocation::File {
        path: path.to_path_buf(),
    };
    Arc::new(SqliteSessionFactory::bind(site_unit(location)).unwrap())
}

pub fn person_repo(factory: &Arc<SqliteSessionFactory>) -> PersonRepository {
    PersonRepository::new(Arc::clone(factory), PERSON).unwrap()
}
