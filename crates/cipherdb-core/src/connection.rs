//! The driver contract.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous database connection.
///
/// Implemented by the SQLite driver and by the façade's `Database`, which
/// serializes every call through its queue. Object-safe so schema and query
/// helpers can take `&dyn Connection`.
pub trait Connection {
    /// Execute a statement that returns no rows. Returns the affected row count.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an `INSERT` and return the rowid of the inserted row.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Execute a query and collect every row.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Check whether a table with the given name exists. SQLite table names
    /// are case-insensitive, so the lookup is too.
    fn table_exists(&self, table: &str) -> Result<bool> {
        let rows = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            &[Value::Text(table.to_string())],
        )?;
        Ok(!rows.is_empty())
    }
}

impl<C: Connection + ?Sized> Connection for &C {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        (**self).insert(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }
}
