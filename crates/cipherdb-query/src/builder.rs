//! Query builders for INSERT, UPDATE and DELETE.

use cipherdb_core::{Connection, Error, Model, Result, Value, quote_ident};
use std::marker::PhantomData;

use crate::criteria::Criteria;

/// Whether an auto-increment key still holds its "unset" value.
fn is_unset_key(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Integer(0))
}

/// INSERT query builder.
///
/// ```ignore
/// let (sql, params) = InsertBuilder::new(&hero).build();
/// let id = InsertBuilder::new(&hero).execute(&conn)?;
/// ```
#[derive(Debug)]
pub struct InsertBuilder<'a, M: Model> {
    model: &'a M,
}

impl<'a, M: Model> InsertBuilder<'a, M> {
    /// Create a new INSERT builder for the given model instance.
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Build the INSERT SQL and parameters.
    ///
    /// An auto-increment primary key that is still NULL or 0 is left out so
    /// the engine assigns it.
    pub fn build(&self) -> (String, Vec<Value>) {
        let fields = M::fields();
        let (columns, values): (Vec<String>, Vec<Value>) = self
            .model
            .to_row()
            .into_iter()
            .filter(|(column, value)| {
                !fields
                    .iter()
                    .any(|f| f.column_name == *column && f.auto_increment && is_unset_key(value))
            })
            .map(|(column, value)| (quote_ident(column), value))
            .unzip();

        if columns.is_empty() {
            return (
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(M::TABLE_NAME)),
                Vec::new(),
            );
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(M::TABLE_NAME),
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, values)
    }

    /// Execute the INSERT and return the new rowid.
    pub fn execute<C: Connection + ?Sized>(self, conn: &C) -> Result<i64> {
        let (sql, params) = self.build();
        conn.insert(&sql, &params)
    }
}

/// UPDATE query builder keyed on the model's primary key.
#[derive(Debug)]
pub struct UpdateBuilder<'a, M: Model> {
    model: &'a M,
}

impl<'a, M: Model> UpdateBuilder<'a, M> {
    /// Create a new UPDATE builder for the given model instance.
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Build the UPDATE SQL and parameters.
    ///
    /// Fails if the model has no primary key or the key is NULL.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let key_column = M::primary_key_field()
            .map(|f| f.column_name)
            .ok_or_else(|| Error::model(format!("{} has no primary key", M::TABLE_NAME)))?;

        let mut key_value = None;
        let mut sets = Vec::new();
        let mut params = Vec::new();
        for (column, value) in self.model.to_row() {
            if column.eq_ignore_ascii_case(key_column) {
                key_value = Some(value);
                continue;
            }
            params.push(value);
            sets.push(format!("{} = ?{}", quote_ident(column), params.len()));
        }

        let key_value = match key_value {
            Some(Value::Null) | None => {
                return Err(Error::model(format!(
                    "cannot update {}: `{key_column}` is not set",
                    M::TABLE_NAME
                )));
            }
            Some(v) => v,
        };
        if sets.is_empty() {
            return Err(Error::model(format!(
                "{} has no columns to update",
                M::TABLE_NAME
            )));
        }

        params.push(key_value);
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(M::TABLE_NAME),
            sets.join(", "),
            quote_ident(key_column),
            params.len()
        );
        Ok((sql, params))
    }

    /// Execute the UPDATE and return the number of rows changed.
    pub fn execute<C: Connection + ?Sized>(self, conn: &C) -> Result<u64> {
        let (sql, params) = self.build()?;
        conn.execute(&sql, &params)
    }
}

#[derive(Debug)]
enum DeleteTarget {
    PrimaryKey { column: &'static str, value: Value },
    Criteria(Criteria),
    All,
}

/// DELETE query builder.
#[derive(Debug)]
pub struct DeleteBuilder<M: Model> {
    target: DeleteTarget,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> DeleteBuilder<M> {
    /// Delete the row of a model instance, matched on its primary key.
    pub fn from_model(model: &M) -> Result<Self> {
        let field = M::primary_key_field()
            .ok_or_else(|| Error::model(format!("{} has no primary key", M::TABLE_NAME)))?;
        let value = model
            .primary_key_value()
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                Error::model(format!(
                    "cannot delete {}: `{}` is not set",
                    M::TABLE_NAME,
                    field.column_name
                ))
            })?;
        Ok(Self {
            target: DeleteTarget::PrimaryKey {
                column: field.column_name,
                value,
            },
            _marker: PhantomData,
        })
    }

    /// Delete the rows matching `criteria` (ordering and paging are ignored).
    pub fn filtered(criteria: Criteria) -> Self {
        Self {
            target: DeleteTarget::Criteria(criteria),
            _marker: PhantomData,
        }
    }

    /// Delete every row in the table.
    pub fn all() -> Self {
        Self {
            target: DeleteTarget::All,
            _marker: PhantomData,
        }
    }

    /// Build the DELETE SQL and parameters.
    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        let table = quote_ident(M::TABLE_NAME);
        match &self.target {
            DeleteTarget::PrimaryKey { column, value } => Ok((
                format!("DELETE FROM {table} WHERE {} = ?1", quote_ident(column)),
                vec![value.clone()],
            )),
            DeleteTarget::Criteria(criteria) => {
                let (tail, params) = criteria.build_where(1)?;
                if tail.is_empty() {
                    Ok((format!("DELETE FROM {table}"), params))
                } else {
                    Ok((format!("DELETE FROM {table} {tail}"), params))
                }
            }
            DeleteTarget::All => Ok((format!("DELETE FROM {table}"), Vec::new())),
        }
    }

    /// Execute the DELETE and return the number of rows removed.
    pub fn execute<C: Connection + ?Sized>(self, conn: &C) -> Result<u64> {
        let (sql, params) = self.build()?;
        conn.execute(&sql, &params)
    }
}

/// `SELECT <columns> FROM "table" <criteria>` for model `M`.
///
/// Columns are listed explicitly so extra columns in the live table are
/// never read.
pub fn select_sql<M: Model>(criteria: &Criteria) -> Result<(String, Vec<Value>)> {
    let columns: Vec<String> = M::fields()
        .iter()
        .map(|f| quote_ident(f.column_name))
        .collect();
    let (tail, params) = criteria.build(1)?;
    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_ident(M::TABLE_NAME)
    );
    if !tail.is_empty() {
        sql.push(' ');
        sql.push_str(&tail);
    }
    Ok((sql, params))
}

/// `SELECT COUNT(*) FROM "table" <conditions>` for model `M`.
pub fn count_sql<M: Model>(criteria: &Criteria) -> Result<(String, Vec<Value>)> {
    let (tail, params) = criteria.build_where(1)?;
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(M::TABLE_NAME));
    if !tail.is_empty() {
        sql.push(' ');
        sql.push_str(&tail);
    }
    Ok((sql, params))
}
