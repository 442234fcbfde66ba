//! The `Model` trait.

use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;

/// A struct persisted as one row of one table.
///
/// Normally implemented with `#[derive(Model)]`, which reflects the struct's
/// fields into [`FieldInfo`] entries. Fields marked `skip` are transient and
/// never reach the database.
pub trait Model: Sized {
    /// Table the model is stored in.
    const TABLE_NAME: &'static str;

    /// Persisted fields in declaration order.
    fn fields() -> &'static [FieldInfo];

    /// Column/value pairs for every persisted field, in `fields()` order.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Rebuild a model from a result row. Transient fields get their default.
    fn from_row(row: &Row) -> Result<Self>;

    /// Current primary key value, or `None` if the model declares no key.
    fn primary_key_value(&self) -> Option<Value>;

    /// Store a primary key value (used after an auto-increment insert).
    fn set_primary_key_value(&mut self, value: &Value) -> Result<()>;

    /// The primary key field, if declared.
    fn primary_key_field() -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.primary_key)
    }

    /// Whether this instance has not been stored yet.
    ///
    /// True when there is no key, the key is NULL, or an auto-increment key
    /// still holds `0`.
    fn is_new(&self) -> bool {
        let Some(field) = Self::primary_key_field() else {
            return true;
        };
        match self.primary_key_value() {
            None | Some(Value::Null) => true,
            Some(Value::Integer(0)) => field.auto_increment,
            Some(_) => false,
        }
    }

    /// Look up a persisted field by Rust name or column name.
    fn field(name: &str) -> Option<&'static FieldInfo> {
        Self::fields().iter().find(|f| f.matches_name(name))
    }

    /// Look up a column name, or fail with a model error.
    fn column_for(name: &str) -> Result<&'static str> {
        Self::field(name)
            .map(|f| f.column_name)
            .ok_or_else(|| Error::model(format!("{} has no field `{name}`", Self::TABLE_NAME)))
    }

    /// Human-readable `Table { col: value, ... }` dump of the persisted fields.
    fn describe(&self) -> String {
        let body = self
            .to_row()
            .into_iter()
            .map(|(col, value)| match value {
                Value::Text(s) => format!("{col}: {s:?}"),
                other => format!("{col}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {{ {body} }}", Self::TABLE_NAME)
    }
}
