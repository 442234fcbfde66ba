//! CRUD, batch and query behaviour against a real in-memory SQLite database.

use std::sync::{Arc, Mutex};

use cipherdb::prelude::*;
use cipherdb::{Connection, Criteria};

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "heroes")]
struct Hero {
    #[cipherdb(primary_key, auto_increment)]
    id: i64,
    #[cipherdb(column = "hero_name", not_null)]
    name: String,
    #[cipherdb(unique)]
    secret_name: String,
    age: Option<i32>,
    #[cipherdb(skip)]
    selected: bool,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "tags")]
struct Tag {
    #[cipherdb(primary_key)]
    code: String,
    label: String,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "log_lines")]
struct LogLine {
    body: String,
}

fn hero(name: &str, secret: &str, age: Option<i32>) -> Hero {
    Hero {
        id: 0,
        name: name.to_string(),
        secret_name: secret.to_string(),
        age,
        selected: false,
    }
}

fn setup() -> Database {
    let db = Database::open_in_memory().expect("open in-memory database");
    db.register::<Hero>().expect("register heroes");
    db.register::<Tag>().expect("register tags");
    db.register::<LogLine>().expect("register log lines");
    db
}

#[test]
fn register_creates_table_once() {
    let db = Database::open_in_memory().unwrap();
    let first = db.register::<Hero>().unwrap();
    assert!(first.created);

    let second = db.register::<Hero>().unwrap();
    assert!(second.is_noop());
    assert_eq!(db.registered_tables().len(), 1);
    assert!(db.table_exists::<Hero>().unwrap());

    let columns: Vec<String> = db
        .columns::<Hero>()
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(columns, ["id", "hero_name", "secret_name", "age"]);
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "Heroes")]
struct HeroSummary {
    #[cipherdb(primary_key, auto_increment)]
    id: i64,
    #[cipherdb(column = "hero_name")]
    name: String,
}

#[test]
fn register_matches_table_names_case_insensitively() {
    let db = setup();
    db.save(&mut hero("Deadpond", "Dive Wilson", None)).unwrap();

    let report = db.register::<HeroSummary>().unwrap();
    assert!(!report.created);
    assert!(report.added_columns.is_empty());
    assert!(db.table_exists::<HeroSummary>().unwrap());
    assert_eq!(db.find_all::<HeroSummary>().unwrap()[0].name, "Deadpond");
}

#[test]
fn save_assigns_auto_increment_key() {
    let db = setup();
    let mut first = hero("Deadpond", "Dive Wilson", None);
    let mut second = hero("Spider-Boy", "Pedro Parqueador", Some(17));

    assert_eq!(db.save(&mut first).unwrap(), 1);
    assert_eq!(db.save(&mut second).unwrap(), 2);
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);

    let loaded = db.find_by_pk::<Hero>(2).unwrap().unwrap();
    assert_eq!(loaded, second);
}

#[test]
fn skipped_field_is_not_persisted() {
    let db = setup();
    let mut h = hero("Rusty-Man", "Tommy Sharp", Some(48));
    h.selected = true;
    db.save(&mut h).unwrap();

    let loaded = db.find_by_pk::<Hero>(h.id).unwrap().unwrap();
    assert!(!loaded.selected);
    assert_eq!(loaded.name, "Rusty-Man");
}

#[test]
fn update_and_delete_by_primary_key() {
    let db = setup();
    let mut h = hero("Deadpond", "Dive Wilson", None);
    db.save(&mut h).unwrap();

    h.age = Some(30);
    assert_eq!(db.update(&h).unwrap(), 1);
    assert_eq!(db.find_by_pk::<Hero>(h.id).unwrap().unwrap().age, Some(30));

    assert_eq!(db.delete(&h).unwrap(), 1);
    assert!(db.find_by_pk::<Hero>(h.id).unwrap().is_none());
    assert_eq!(db.delete(&h).unwrap(), 0);
}

#[test]
fn update_without_key_fails() {
    let db = setup();
    let line = LogLine { body: "x".into() };
    let err = db.update(&line).unwrap_err();
    assert!(matches!(err, Error::Model(_)));
}

#[test]
fn save_or_update_switches_on_existing_key() {
    let db = setup();
    let mut tag = Tag {
        code: "rs".into(),
        label: "Rust".into(),
    };
    assert!(matches!(db.save_or_update(&mut tag).unwrap(), Upsert::Inserted(_)));

    tag.label = "Rust language".into();
    assert_eq!(db.save_or_update(&mut tag).unwrap(), Upsert::Updated(1));

    let all = db.find_all::<Tag>().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].label, "Rust language");
}

#[test]
fn save_or_update_by_column_adopts_existing_key() {
    let db = setup();
    let mut original = hero("Deadpond", "Dive Wilson", None);
    db.save(&mut original).unwrap();

    let mut incoming = hero("Deadpond", "Dive Wilson", Some(35));
    let outcome = db
        .save_or_update_by_column(&mut incoming, "secret_name", "Dive Wilson")
        .unwrap();
    assert_eq!(outcome, Upsert::Updated(1));
    assert_eq!(incoming.id, original.id);
    assert_eq!(db.count::<Hero>(Criteria::new()).unwrap(), 1);

    let mut fresh = hero("Tarantula", "Natalia Roman-on", Some(32));
    let outcome = db
        .save_or_update_by_column(&mut fresh, "secret_name", "Natalia Roman-on")
        .unwrap();
    assert!(matches!(outcome, Upsert::Inserted(_)));
    assert_eq!(db.count::<Hero>(Criteria::new()).unwrap(), 2);
}

#[test]
fn save_all_is_all_or_nothing() {
    let db = setup();
    let mut batch = vec![
        hero("A", "same secret", None),
        hero("B", "other", None),
        hero("C", "same secret", None),
    ];

    let err = db.save_all(&mut batch).unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(db.count::<Hero>(Criteria::new()).unwrap(), 0);

    let mut batch = vec![hero("A", "a", None), hero("B", "b", None)];
    let ids = db.save_all(&mut batch).unwrap();
    assert_eq!(ids, [1, 2]);
    assert_eq!(batch[1].id, 2);
}

#[test]
fn failed_batch_leaves_keys_untouched() {
    let db = setup();
    let mut batch = vec![
        hero("A", "same secret", None),
        hero("B", "other", None),
        hero("C", "same secret", None),
    ];
    assert!(db.save_all(&mut batch).is_err());
    assert!(batch.iter().all(|h| h.id == 0));

    // The models can be retried once the conflict is fixed.
    batch[2].secret_name = "third".into();
    assert_eq!(db.save_all(&mut batch).unwrap(), [1, 2, 3]);

    let mut mixed = vec![batch[0].clone(), hero("D", "d", None), hero("E", "other", None)];
    mixed[0].age = Some(99);
    assert!(db.save_or_update_all(&mut mixed).is_err());
    assert_eq!(mixed[0].id, 1);
    assert_eq!(mixed[1].id, 0);
    assert_eq!(mixed[2].id, 0);
    assert_eq!(db.find_by_pk::<Hero>(1).unwrap().unwrap().age, None);
}

#[test]
fn update_all_rolls_back_when_a_key_is_missing() {
    let db = setup();
    let mut batch = vec![hero("A", "a", Some(1)), hero("B", "b", Some(2))];
    db.save_all(&mut batch).unwrap();

    batch[0].age = Some(10);
    let mut with_unsaved = batch.clone();
    with_unsaved.push(hero("C", "c", None));

    let err = db.update_all(&with_unsaved).unwrap_err();
    assert!(matches!(err, Error::Model(_)));
    let reloaded = db.find_by_pk::<Hero>(batch[0].id).unwrap().unwrap();
    assert_eq!(reloaded.age, Some(1));

    assert_eq!(db.update_all(&batch).unwrap(), 2);
    let reloaded = db.find_by_pk::<Hero>(batch[0].id).unwrap().unwrap();
    assert_eq!(reloaded.age, Some(10));
}

#[test]
fn delete_all_skips_models_without_key() {
    let db = setup();
    let mut tags = vec![
        Tag {
            code: "a".into(),
            label: "A".into(),
        },
        Tag {
            code: "b".into(),
            label: "B".into(),
        },
    ];
    db.save_all(&mut tags).unwrap();

    let mut lines = vec![LogLine { body: "one".into() }];
    db.save_all(&mut lines).unwrap();
    assert_eq!(db.delete_all(&lines).unwrap(), 0);
    assert_eq!(db.count::<LogLine>(Criteria::new()).unwrap(), 1);

    assert_eq!(db.delete_all(&tags).unwrap(), 2);
    assert!(db.find_all::<Tag>().unwrap().is_empty());
}

#[test]
fn save_or_update_all_mixes_inserts_and_updates() {
    let db = setup();
    let mut existing = Tag {
        code: "x".into(),
        label: "old".into(),
    };
    db.save(&mut existing).unwrap();

    let mut batch = vec![
        Tag {
            code: "x".into(),
            label: "new".into(),
        },
        Tag {
            code: "y".into(),
            label: "why".into(),
        },
    ];
    let outcomes = db.save_or_update_all(&mut batch).unwrap();
    assert_eq!(outcomes[0], Upsert::Updated(1));
    assert!(matches!(outcomes[1], Upsert::Inserted(_)));
    assert_eq!(db.count::<Tag>(Criteria::new()).unwrap(), 2);
}

#[test]
fn criteria_and_select_queries() {
    let db = setup();
    let mut batch = vec![
        hero("Deadpond", "Dive Wilson", None),
        hero("Spider-Boy", "Pedro Parqueador", Some(17)),
        hero("Rusty-Man", "Tommy Sharp", Some(48)),
        hero("Tarantula", "Natalia Roman-on", Some(32)),
    ];
    db.save_all(&mut batch).unwrap();

    let adults = db
        .query::<Hero>()
        .filter("age", ">=", 18)
        .order_by("age", false)
        .fetch(&db)
        .unwrap();
    let names: Vec<&str> = adults.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, ["Rusty-Man", "Tarantula"]);

    let criteria = Criteria::new()
        .filter::<Hero>("name", "=", "Deadpond")
        .or_filter::<Hero>("age", "<", 18);
    assert_eq!(db.count::<Hero>(criteria.clone()).unwrap(), 2);
    assert_eq!(db.find::<Hero>(criteria).unwrap().len(), 2);

    let unaged = db
        .find_first::<Hero>(Criteria::raw("WHERE age IS NULL"))
        .unwrap()
        .unwrap();
    assert_eq!(unaged.name, "Deadpond");

    let page = db
        .query::<Hero>()
        .order_by("id", true)
        .limit(2)
        .offset(1)
        .fetch(&db)
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].name, "Spider-Boy");

    let bad = db.find::<Hero>(Criteria::new().filter::<Hero>("power", "=", 1));
    assert!(matches!(bad, Err(Error::Criteria(_))));
}

#[test]
fn delete_where_and_clear_table() {
    let db = setup();
    let mut batch = vec![
        hero("A", "a", Some(10)),
        hero("B", "b", Some(20)),
        hero("C", "c", Some(30)),
    ];
    db.save_all(&mut batch).unwrap();

    let removed = db
        .delete_where::<Hero>(Criteria::new().filter::<Hero>("age", "<", 25))
        .unwrap();
    assert_eq!(removed, 2);
    assert!(db.exists(&batch[2]).unwrap());
    assert!(!db.exists(&batch[0]).unwrap());

    db.clear_table::<Hero>().unwrap();
    assert_eq!(db.count::<Hero>(Criteria::new()).unwrap(), 0);
}

#[test]
fn model_ext_forwards_to_database() {
    let db = setup();
    let mut h = hero("Deadpond", "Dive Wilson", None);
    h.save(&db).unwrap();
    h.age = Some(40);
    ModelExt::update(&h, &db).unwrap();

    let found = Hero::find_first(&db, Criteria::new().filter::<Hero>("name", "=", "Deadpond"))
        .unwrap()
        .unwrap();
    assert_eq!(found.age, Some(40));
    assert_eq!(Hero::find_all(&db).unwrap().len(), 1);
    assert_eq!(Hero::query().filter("age", ">", 30).count(&db).unwrap(), 1);

    ModelExt::delete(&h, &db).unwrap();
    assert!(Hero::find_by_pk(&db, h.id).unwrap().is_none());
}

#[test]
fn observers_see_committed_writes_only() {
    let db = setup();
    let seen: Arc<Mutex<Vec<(ChangeKind, &'static str)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let subscription = db.subscribe(move |event| {
        sink.lock().unwrap().push((event.kind, event.table));
    });

    let mut h = hero("Deadpond", "Dive Wilson", None);
    db.save(&mut h).unwrap();
    h.age = Some(1);
    db.update(&h).unwrap();

    let mut failing = vec![hero("X", "dup", None), hero("Y", "dup", None)];
    assert!(db.save_all(&mut failing).is_err());

    db.delete(&h).unwrap();
    db.clear_table::<Tag>().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        [
            (ChangeKind::Insert, "heroes"),
            (ChangeKind::Update, "heroes"),
            (ChangeKind::Delete, "heroes"),
            (ChangeKind::Clear, "tags"),
        ]
    );

    assert!(db.unsubscribe(subscription));
    db.save(&mut hero("Z", "z", None)).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[test]
fn in_transaction_rolls_back_on_error() {
    let db = setup();
    let result: cipherdb::Result<()> = db.in_transaction(|conn| {
        conn.execute(
            "INSERT INTO tags (code, label) VALUES (?1, ?2)",
            &[Value::from("t"), Value::from("temp")],
        )?;
        Err(Error::Custom("abort".into()))
    });
    assert!(result.is_err());
    assert_eq!(db.count::<Tag>(Criteria::new()).unwrap(), 0);
}

#[test]
fn database_is_a_connection() {
    let db = setup();
    let inserted = Connection::insert(
        &db,
        "INSERT INTO tags (code, label) VALUES (?1, ?2)",
        &[Value::from("c"), Value::from("C")],
    )
    .unwrap();
    assert_eq!(inserted, 1);

    let rows = Connection::query(&db, "SELECT label FROM tags", &[]).unwrap();
    assert_eq!(rows[0].get_named::<String>("label").unwrap(), "C");
}

#[test]
fn closed_database_reports_connection_error() {
    let db = setup();
    db.close().unwrap();
    let err = db.find_all::<Hero>().unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}
