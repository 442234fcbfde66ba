//! SQL building for cipherdb models.
//!
//! - [`Criteria`] collects `WHERE` conditions, ordering and paging, resolving
//!   field names against a model's metadata and binding every value.
//! - [`Select`] is a typed, fluent query with `fetch`/`first`/`count`/`delete`.
//! - [`InsertBuilder`], [`UpdateBuilder`] and [`DeleteBuilder`] turn a model
//!   instance into DML.
//!
//! All SQL targets SQLite and uses numbered `?N` placeholders.

pub mod builder;
pub mod criteria;
pub mod select;

pub use builder::{DeleteBuilder, InsertBuilder, UpdateBuilder, count_sql, select_sql};
pub use criteria::{Conjunction, Criteria, Operator};
pub use select::Select;
