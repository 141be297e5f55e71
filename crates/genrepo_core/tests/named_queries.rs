mod support;

use genrepo_core::rusqlite::types::Value;
use genrepo_core::{DbError, QueryParam, RepoError, Repository, Session};
use std::sync::Arc;
use support::{memory_factory, person_repo, Note, NoteRepository, Person, NOTE, PERSON};

fn seeded_repo() -> (Arc<genrepo_core::SqliteSessionFactory>, support::PersonRepository) {
    let factory = memory_factory();
    let repo = person_repo(&factory);
    for person in [
        Person::new(1, "Ada", Some("London")),
        Person::new(2, "Alan", Some("London")),
        Person::new(3, "Kurt", Some("Vienna")),
        Person::new(4, "Emmy", None),
    ] {
        repo.save(&person).unwrap();
    }
    (factory, repo)
}

#[test]
fn named_query_without_parameters_returns_all_matches() {
    let (_factory, repo) = seeded_repo();

    let ids: Vec<i64> = repo
        .get_all_named_query("Person.all")
        .unwrap()
        .into_iter()
        .map(|person| person.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[test]
fn restriction_binds_text_values() {
    let (_factory, repo) = seeded_repo();

    let londoners = repo
        .get_by_restriction("Person.byCity", "city", "London".to_string())
        .unwrap();
    assert_eq!(
        londoners,
        vec![
            Person::new(1, "Ada", Some("London")),
            Person::new(2, "Alan", Some("London")),
        ]
    );

    assert!(repo
        .get_by_restriction("Person.byCity", "city", "Paris".to_string())
        .unwrap()
        .is_empty());
}

#[test]
fn restriction_binds_non_text_values() {
    let (_factory, repo) = seeded_repo();

    let ids: Vec<i64> = repo
        .get_by_restriction("Person.idAbove", ":id", 2_i64)
        .unwrap()
        .into_iter()
        .map(|person| person.id)
        .collect();
    assert_eq!(ids, vec![3, 4]);

    let ids: Vec<i64> = repo
        .get_by_restriction("Person.idAbove", "id", Value::Integer(3))
        .unwrap()
        .into_iter()
        .map(|person| person.id)
        .collect();
    assert_eq!(ids, vec![4]);
}

#[test]
fn unique_restriction_distinguishes_zero_one_and_many() {
    let (_factory, repo) = seeded_repo();

    let none = repo
        .get_unique_by_restriction("Person.byName", "name", "Nobody".to_string())
        .unwrap();
    assert!(none.is_none());

    let one = repo
        .get_unique_by_restriction("Person.byName", "name", "Kurt".to_string())
        .unwrap();
    assert_eq!(one, Some(Person::new(3, "Kurt", Some("Vienna"))));

    let err = repo
        .get_unique_by_restriction("Person.byCity", "city", "London".to_string())
        .unwrap_err();
    match err {
        RepoError::NonUniqueResult { query, count } => {
            assert_eq!(query, "Person.byCity");
            assert_eq!(count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unique_restriction_stops_after_second_match() {
    let (_factory, repo) = seeded_repo();

    let err = repo
        .get_unique_by_restriction("Person.idAbove", "id", 0_i64)
        .unwrap_err();
    assert!(matches!(err, RepoError::NonUniqueResult { count: 2, .. }));
}

#[test]
fn session_named_query_honors_row_limit() {
    let (_factory, repo) = seeded_repo();
    let mut session = repo.session().unwrap();

    let param = QueryParam::new("id", 0_i64);
    let limited: Vec<Person> = session
        .named_query(&PERSON, "Person.idAbove", Some(&param), Some(1))
        .unwrap();
    assert_eq!(limited, vec![Person::new(1, "Ada", Some("London"))]);

    let everyone: Vec<Person> = session
        .named_query(&PERSON, "Person.all", None, None)
        .unwrap();
    assert_eq!(everyone.len(), 4);
    session.release();
}

#[test]
fn unknown_named_query_is_a_query_error() {
    let (_factory, repo) = seeded_repo();

    let err = repo.get_all_named_query("Person.missing").unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(DbError::NamedQueryNotFound(ref name)) if name == "Person.missing"
    ));
}

#[test]
fn named_query_of_another_entity_is_rejected() {
    let (factory, _repo) = seeded_repo();
    let notes = NoteRepository::new(Arc::clone(&factory), NOTE).unwrap();
    notes
        .save(&Note {
            id: "n-1".to_string(),
            body: "hello".to_string(),
        })
        .unwrap();

    let err = notes.get_all_named_query("Person.all").unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(DbError::NamedQueryEntityMismatch { .. })
    ));
    assert_eq!(notes.get_all_named_query("Note.all").unwrap().len(), 1);
}

#[test]
fn binding_an_undeclared_parameter_is_a_query_error() {
    let (_factory, repo) = seeded_repo();

    let err = repo
        .get_by_restriction("Person.byCity", "town", "London".to_string())
        .unwrap_err();
    assert!(matches!(err, RepoError::Query(DbError::Sqlite(_))));
}
