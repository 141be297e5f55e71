mod support;

use genrepo_core::{DbError, RepoError, RepoResult, Repository, Session, SqliteSessionFactory};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use support::{file_factory, memory_factory, person_repo, Person, PersonRepository, PERSON};

#[test]
fn save_merge_remove_scenario() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    repo.save(&Person::new(1, "a", None)).unwrap();
    assert_eq!(repo.get_all().unwrap(), vec![Person::new(1, "a", None)]);

    repo.merge(&Person::new(1, "b", None)).unwrap();
    assert_eq!(repo.get_by_id(&1).unwrap(), Some(Person::new(1, "b", None)));

    repo.remove(&Person::new(1, "b", None)).unwrap();
    assert_eq!(repo.get_by_id(&1).unwrap(), None);
}

#[test]
fn save_and_get_roundtrip() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    let person = Person::new(7, "Ada", Some("London"));
    repo.save(&person).unwrap();

    let loaded = repo.get_by_id(&7).unwrap().unwrap();
    assert_eq!(loaded, person);
}

#[test]
fn get_by_id_of_unknown_key_is_none() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    assert!(repo.get_by_id(&404).unwrap().is_none());
}

#[test]
fn merge_replaces_every_field() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    repo.save(&Person::new(3, "Grace", Some("Arlington"))).unwrap();
    repo.merge(&Person::new(3, "Grace Hopper", None)).unwrap();

    let loaded = repo.get_by_id(&3).unwrap().unwrap();
    assert_eq!(loaded.name, "Grace Hopper");
    assert_eq!(loaded.city, None);
}

#[test]
fn merge_inserts_missing_entity() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    repo.merge(&Person::new(5, "Linus", Some("Helsinki"))).unwrap();
    assert_eq!(
        repo.get_by_id(&5).unwrap(),
        Some(Person::new(5, "Linus", Some("Helsinki")))
    );
}

#[test]
fn get_all_returns_exactly_persisted_entities() {
    let factory = memory_factory();
    let repo = person_repo(&factory);
    assert!(repo.get_all().unwrap().is_empty());

    for id in 1..=4 {
        repo.save(&Person::new(id, &format!("p{id}"), None)).unwrap();
    }
    repo.remove(&Person::new(2, "p2", None)).unwrap();

    let ids: HashSet<i64> = repo
        .get_all()
        .unwrap()
        .into_iter()
        .map(|person| person.id)
        .collect();
    assert_eq!(ids, HashSet::from([1, 3, 4]));
}

#[test]
fn saving_duplicate_key_is_rolled_back() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    repo.save(&Person::new(1, "original", None)).unwrap();
    let err = repo.save(&Person::new(1, "duplicate", None)).unwrap_err();

    assert!(matches!(
        err,
        RepoError::Transaction {
            operation: "save",
            source: DbError::Sqlite(_)
        }
    ));
    assert_eq!(
        repo.get_by_id(&1).unwrap(),
        Some(Person::new(1, "original", None))
    );
}

#[test]
fn removing_unknown_entity_returns_not_found() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    let err = repo.remove(&Person::new(9, "ghost", None)).unwrap_err();
    match err {
        RepoError::NotFound { entity, key } => {
            assert_eq!(entity, "Person");
            assert_eq!(key, "9");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn validation_failure_blocks_writes() {
    let factory = memory_factory();
    let repo = person_repo(&factory);

    let err = repo.save(&Person::new(1, "  ", None)).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    repo.save(&Person::new(2, "valid", None)).unwrap();
    let err = repo.merge(&Person::new(2, "", None)).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    assert!(repo.get_by_id(&1).unwrap().is_none());
    assert_eq!(repo.get_by_id(&2).unwrap().unwrap().name, "valid");
}

/// Entity-specific repository that adds its own query on top of the generic one.
struct PeopleDirectory {
    base: PersonRepository,
}

impl PeopleDirectory {
    fn new(factory: Arc<SqliteSessionFactory>) -> RepoResult<Self> {
        Ok(Self {
            base: PersonRepository::new(factory, PERSON)?,
        })
    }

    fn count_in_city(&self, city: &str) -> RepoResult<i64> {
        let session = self.base.session()?;
        let conn = session.connection().map_err(RepoError::Query)?;
        let count = conn
            .query_row(
                "SELECT COUNT(*) FROM people WHERE city = ?1;",
                [city],
                |row| row.get(0),
            )
            .map_err(|err| RepoError::Query(err.into()))?;
        Ok(count)
    }
}

#[test]
fn concrete_repository_reuses_generic_operations() {
    let factory = memory_factory();
    let directory = PeopleDirectory::new(factory).unwrap();

    directory.base.save(&Person::new(1, "Ada", Some("London"))).unwrap();
    directory.base.save(&Person::new(2, "Alan", Some("London"))).unwrap();
    directory.base.save(&Person::new(3, "Kurt", Some("Vienna"))).unwrap();

    assert_eq!(directory.count_in_city("London").unwrap(), 2);
    assert_eq!(directory.count_in_city("Paris").unwrap(), 0);
    assert_eq!(directory.base.descriptor().table, "people");
}

#[test]
fn repository_can_be_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir.path().join("shared.sqlite3"));
    let repo = Arc::new(person_repo(&factory));

    let handles = (0..4)
        .map(|worker| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for offset in 0..10 {
                    let id = worker * 100 + offset;
                    repo.save(&Person::new(id, &format!("worker-{worker}"), None))
                        .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(repo.get_all().unwrap().len(), 40);
}

#[test]
fn memory_repository_serves_concurrent_readers_and_writers() {
    let factory = memory_factory();
    let repo = Arc::new(person_repo(&factory));

    let writer = {
        let repo = Arc::clone(&repo);
        thread::spawn(move || {
            for id in 0..200 {
                repo.save(&Person::new(id, "writer", None)).unwrap();
            }
        })
    };
    let reader = {
        let repo = Arc::clone(&repo);
        thread::spawn(move || {
            for _ in 0..200 {
                let seen = repo.get_all().unwrap().len();
                assert!(seen <= 200);
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(repo.get_all().unwrap().len(), 200);
}

#[test]
fn memory_reader_waits_for_open_write_instead_of_failing() {
    let factory = memory_factory();
    let repo = Arc::new(person_repo(&factory));
    repo.save(&Person::new(1, "committed", None)).unwrap();

    let mut writer = repo.session().unwrap();
    writer.begin().unwrap();
    writer
        .insert(&PERSON, &Person::new(2, "pending", None))
        .unwrap();

    let reader = {
        let repo = Arc::clone(&repo);
        thread::spawn(move || repo.get_all())
    };
    thread::sleep(Duration::from_millis(50));
    writer.commit().unwrap();
    writer.release();

    let seen = reader.join().unwrap().unwrap();
    assert!(seen.contains(&Person::new(1, "committed", None)));
    assert_eq!(repo.get_all().unwrap().len(), 2);
}

#[test]
fn file_reads_see_committed_rows_while_another_session_writes() {
    let dir = tempfile::tempdir().unwrap();
    let factory = file_factory(&dir.path().join("reads.sqlite3"));
    let repo = person_repo(&factory);
    repo.save(&Person::new(1, "committed", None)).unwrap();

    let mut writer = repo.session().unwrap();
    writer.begin().unwrap();
    writer
        .insert(&PERSON, &Person::new(2, "pending", None))
        .unwrap();
    assert_eq!(
        repo.get_all().unwrap(),
        vec![Person::new(1, "committed", None)]
    );
    writer.commit().unwrap();
    writer.release();

    assert_eq!(repo.get_all().unwrap().len(), 2);
}
