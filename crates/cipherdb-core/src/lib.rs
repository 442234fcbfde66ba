//! Core types and traits for cipherdb.
//!
//! `cipherdb-core` is the contract layer the rest of the workspace builds on:
//!
//! - `Model` is implemented by user structs (normally through
//!   `#[derive(Model)]` from `cipherdb-macros`) and carries the reflected
//!   column metadata as [`FieldInfo`] entries.
//! - `Connection` is implemented by the SQLite driver and by the façade's
//!   `Database`.
//! - `Value`, `Row` and `SqlType` are shared by the query, schema and driver
//!   crates.
//!
//! Most applications should depend on the `cipherdb` façade instead.

pub mod connection;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod model;
pub mod row;
pub mod types;
pub mod value;

pub use connection::Connection;
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind, Result, TypeError,
};
pub use field::{FieldInfo, ReferentialAction};
pub use identifiers::quote_ident;
pub use model::Model;
pub use row::Row;
pub use types::{HasSqlType, SqlType};
pub use value::{FromValue, ToValue, Value};
