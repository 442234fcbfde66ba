//! Result rows.

use std::sync::Arc;

use crate::error::{Error, Result, TypeError};
use crate::value::{FromValue, Value};

/// A single row returned by a query.
///
/// Column names are shared between all rows of one result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from shared column names and its values.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs. Mostly useful in tests.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw value by position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Raw value by column name (case-insensitive, like SQLite identifiers).
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// Typed value by column name.
    pub fn get_named<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get_value(column)
            .ok_or_else(|| Error::Custom(format!("column `{column}` not present in row")))?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(t) => Error::Type(TypeError {
                column: Some(column.to_string()),
                ..t
            }),
            other => other,
        })
    }

    /// Typed value for a model field.
    ///
    /// Like [`Row::get_named`], except a NULL in a column whose type cannot
    /// hold NULL reads as [`FromValue::from_null`] (`0`, `""`, `false`, ...)
    /// instead of failing.
    pub fn get_field<T: FromValue>(&self, column: &str) -> Result<T> {
        if matches!(self.get_value(column), Some(Value::Null)) {
            if let Some(value) = T::from_null() {
                return Ok(value);
            }
        }
        self.get_named(column)
    }

    /// Typed value by position.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self
            .get(index)
            .ok_or_else(|| Error::Custom(format!("column index {index} out of range")))?;
        T::from_value(value)
    }

    /// Iterate `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
