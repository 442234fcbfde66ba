//! File-backed databases: paths, persistence and directory switching.

use cipherdb::prelude::*;

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "contacts")]
struct Contact {
    #[cipherdb(primary_key, auto_increment)]
    id: i64,
    #[cipherdb(not_null)]
    name: String,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "contacts")]
struct ContactV2 {
    #[cipherdb(primary_key, auto_increment)]
    id: i64,
    #[cipherdb(not_null)]
    name: String,
    #[cipherdb(default = "''")]
    email: String,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[cipherdb(table = "contacts")]
struct ContactV3 {
    #[cipherdb(primary_key, auto_increment)]
    id: i64,
    #[cipherdb(not_null)]
    name: String,
    phone: String,
    calls: i64,
    nickname: Option<String>,
}

fn config(base: &std::path::Path) -> DatabaseConfig {
    DatabaseConfig::new()
        .base_dir(base)
        .directory("main")
}

#[test]
fn open_creates_directory_and_file() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::open(config(tmp.path())).unwrap();

    let path = db.path().unwrap().unwrap();
    assert_eq!(path, tmp.path().join("main").join("cipherdb.sqlite"));
    assert!(path.exists());
}

#[test]
fn rows_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let db = Database::open(config(tmp.path())).unwrap();
        db.register::<Contact>().unwrap();
        db.save(&mut Contact {
            id: 0,
            name: "Ada".into(),
        })
        .unwrap();
    }

    let db = Database::open(config(tmp.path())).unwrap();
    let all = db.find_all::<Contact>().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Ada");
}

#[test]
fn register_adds_new_columns_to_existing_table() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::open(config(tmp.path())).unwrap();
    db.register::<Contact>().unwrap();
    db.save(&mut Contact {
        id: 0,
        name: "Ada".into(),
    })
    .unwrap();

    let report = db.register::<ContactV2>().unwrap();
    assert!(!report.created);
    assert_eq!(report.added_columns, ["email"]);

    let loaded = db.find_by_pk::<ContactV2>(1).unwrap().unwrap();
    assert_eq!(loaded.email, "");
}

#[test]
fn rows_stay_readable_after_columns_without_default_are_added() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::open(config(tmp.path())).unwrap();
    db.register::<Contact>().unwrap();
    db.save(&mut Contact {
        id: 0,
        name: "Ada".into(),
    })
    .unwrap();

    let report = db.register::<ContactV3>().unwrap();
    assert_eq!(report.added_columns, ["phone", "calls", "nickname"]);

    let all = db.find_all::<ContactV3>().unwrap();
    assert_eq!(
        all,
        [ContactV3 {
            id: 1,
            name: "Ada".into(),
            phone: String::new(),
            calls: 0,
            nickname: None,
        }]
    );
}

#[test]
fn change_directory_reopens_and_syncs_registered_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::open(config(tmp.path())).unwrap();
    db.register::<Contact>().unwrap();
    db.save(&mut Contact {
        id: 0,
        name: "in main".into(),
    })
    .unwrap();

    let new_path = db.change_directory("archive").unwrap();
    assert_eq!(new_path, tmp.path().join("archive").join("cipherdb.sqlite"));
    assert_eq!(db.config().directory_name, "archive");
    assert_eq!(db.path().unwrap(), Some(new_path));

    assert!(db.table_exists::<Contact>().unwrap());
    assert!(db.find_all::<Contact>().unwrap().is_empty());

    db.change_directory("main").unwrap();
    assert_eq!(db.find_all::<Contact>().unwrap().len(), 1);
}

#[test]
fn change_directory_rejects_path_components() {
    let tmp = tempfile::tempdir().unwrap();
    let db = Database::open(config(tmp.path())).unwrap();
    assert!(matches!(
        db.change_directory("../escape"),
        Err(Error::Config(_))
    ));
    assert_eq!(db.config().directory_name, "main");
}

#[cfg(not(feature = "encryption"))]
#[test]
fn key_without_sqlcipher_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let err = Database::open(config(tmp.path()).key("s3cret")).unwrap_err();
    assert!(matches!(err, Error::Encryption(_)));
}

#[test]
fn change_directory_needs_a_file_database() {
    let db = Database::open_in_memory().unwrap();
    assert!(matches!(db.change_directory("other"), Err(Error::Config(_))));
}

#[test]
fn config_deserializes_with_defaults() {
    let config: DatabaseConfig =
        serde_json::from_str(r#"{"directory_name": "vault", "encryption_key": "k"}"#).unwrap();
    assert_eq!(config.directory_name, "vault");
    assert_eq!(config.file_name, "cipherdb.sqlite");
    assert_eq!(config.key_str(), Some("k"));
    assert!(!format!("{config:?}").contains("\"k\""));
}

#[test]
fn shared_instance_can_be_installed() {
    let db = Database::open_in_memory().unwrap();
    db.register::<Contact>().unwrap();
    Database::install_shared(db);

    let shared = Database::shared().unwrap();
    assert!(shared.table_exists::<Contact>().unwrap());
    assert!(std::sync::Arc::ptr_eq(&shared, &Database::shared().unwrap()));
}
