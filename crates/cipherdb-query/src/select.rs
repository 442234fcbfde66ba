//! Fluent SELECT over a model type.

use std::marker::PhantomData;

use cipherdb_core::{Connection, Model, Result, Value};

use crate::builder::{DeleteBuilder, count_sql, select_sql};
use crate::criteria::{Conjunction, Criteria};

/// A typed query over `M`'s table.
///
/// ```ignore
/// let adults = Select::<Hero>::new()
///     .filter("age", ">=", 18)
///     .order_by("name", true)
///     .limit(10)
///     .fetch(&conn)?;
/// ```
#[derive(Debug, Clone)]
pub struct Select<M: Model> {
    criteria: Criteria,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Default for Select<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Select<M> {
    /// Select every row.
    #[must_use]
    pub fn new() -> Self {
        Self::with_criteria(Criteria::new())
    }

    /// Start from existing criteria.
    #[must_use]
    pub fn with_criteria(criteria: Criteria) -> Self {
        Self {
            criteria,
            _marker: PhantomData,
        }
    }

    /// Add a condition joined with `AND` (the first one becomes `WHERE`).
    #[must_use]
    pub fn filter(mut self, field: &str, op: &str, value: impl Into<Value>) -> Self {
        self.criteria = self
            .criteria
            .condition::<M>(Conjunction::Where, field, op, value);
        self
    }

    /// Alias of [`Select::filter`].
    #[must_use]
    pub fn and(mut self, field: &str, op: &str, value: impl Into<Value>) -> Self {
        self.criteria = self
            .criteria
            .condition::<M>(Conjunction::And, field, op, value);
        self
    }

    /// Add a condition joined with `OR`.
    #[must_use]
    pub fn or(mut self, field: &str, op: &str, value: impl Into<Value>) -> Self {
        self.criteria = self
            .criteria
            .condition::<M>(Conjunction::Or, field, op, value);
        self
    }

    /// Order by a field (Rust name or column). An unknown field fails the
    /// query when it is built.
    #[must_use]
    pub fn order_by(mut self, field: &str, ascending: bool) -> Self {
        self.criteria = self.criteria.order_by_field::<M>(field, ascending);
        self
    }

    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.criteria = self.criteria.limit(n);
        self
    }

    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.criteria = self.criteria.offset(n);
        self
    }

    /// The accumulated criteria.
    #[must_use]
    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Build the SELECT SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        select_sql::<M>(&self.criteria)
    }

    /// Run the query and load every matching model.
    pub fn fetch<C: Connection + ?Sized>(&self, conn: &C) -> Result<Vec<M>> {
        let (sql, params) = self.build()?;
        let rows = conn.query(&sql, &params)?;
        tracing::trace!(table = M::TABLE_NAME, rows = rows.len(), "Fetched rows");
        rows.iter().map(M::from_row).collect()
    }

    /// Run the query with `LIMIT 1`.
    pub fn first<C: Connection + ?Sized>(&self, conn: &C) -> Result<Option<M>> {
        let (sql, params) = select_sql::<M>(&self.criteria.clone().limit(1))?;
        conn.query_one(&sql, &params)?
            .map(|row| M::from_row(&row))
            .transpose()
    }

    /// Count matching rows (ordering and paging are ignored).
    pub fn count<C: Connection + ?Sized>(&self, conn: &C) -> Result<u64> {
        let (sql, params) = count_sql::<M>(&self.criteria)?;
        match conn.query_one(&sql, &params)? {
            Some(row) => row.get_as::<u64>(0),
            None => Ok(0),
        }
    }

    /// Delete matching rows (ordering and paging are ignored).
    pub fn delete<C: Connection + ?Sized>(self, conn: &C) -> Result<u64> {
        DeleteBuilder::<M>::filtered(self.criteria).execute(conn)
    }
}
