//! Model-driven CRUD over encrypted SQLite.
//!
//! `cipherdb` is the façade crate. It ties together:
//!
//! - `#[derive(Model)]` (from `cipherdb-macros`), which reflects struct
//!   fields into column metadata,
//! - `cipherdb-schema`, which creates tables and adds missing columns,
//! - `cipherdb-query`, which builds parameterized SQL,
//! - `cipherdb-sqlite`, a `rusqlite` driver that unlocks SQLCipher databases
//!   with `PRAGMA key`,
//!
//! behind a single [`Database`] handle that serializes every call through one
//! connection.
//!
//! ```ignore
//! use cipherdb::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! #[cipherdb(table = "heroes")]
//! struct Hero {
//!     #[cipherdb(primary_key, auto_increment)]
//!     id: i64,
//!     #[cipherdb(not_null)]
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! let db = Database::open(DatabaseConfig::new().key("correct horse"))?;
//! db.register::<Hero>()?;
//!
//! let mut hero = Hero { name: "Deadpond".into(), ..Default::default() };
//! db.save(&mut hero)?;
//!
//! let adults = db.query::<Hero>().filter("age", ">=", 18).fetch(&db)?;
//! ```
//!
//! Build with the `encryption` feature to link SQLCipher. Without it, opening
//! with a key fails with `Error::Encryption` rather than writing plain text.

// The derive names `::cipherdb::__core`; this makes that path resolve inside
// this crate's own tests as well.
extern crate self as cipherdb;

pub mod async_ops;
pub mod config;
pub mod database;
pub mod model_ext;
pub mod observer;

#[doc(hidden)]
pub use cipherdb_core as __core;

pub use cipherdb_core::{
    Connection, ConnectionError, ConnectionErrorKind, Error, FieldInfo, FromValue, HasSqlType,
    Model, QueryError, QueryErrorKind, ReferentialAction, Result, Row, SqlType, ToValue,
    TypeError, Value, quote_ident,
};
pub use cipherdb_macros::Model;
pub use cipherdb_query::{Conjunction, Criteria, DeleteBuilder, InsertBuilder, Operator, Select, UpdateBuilder};
pub use cipherdb_schema::{ColumnInfo, SyncReport, TableDef};
pub use cipherdb_sqlite::{DatabaseQueue, SqliteConnection};

pub use config::{DatabaseConfig, SecretKey};
pub use database::{Database, Upsert};
pub use model_ext::ModelExt;
pub use observer::{ChangeEvent, ChangeKind, Subscription};

pub use asupersync::{Cx, Outcome};

/// Everything needed to declare models and talk to a database.
pub mod prelude {
    pub use crate::{
        ChangeEvent, ChangeKind, Criteria, Cx, Database, DatabaseConfig, Error, Model, ModelExt,
        Outcome, Result, Row, Select, SqlType, Upsert, Value,
    };
}
