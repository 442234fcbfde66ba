//! Schema management for cipherdb.
//!
//! Turns `Model` field metadata into SQLite DDL, reads the live schema back
//! through `PRAGMA table_info`, and keeps a table in step with its model by
//! creating it or adding the columns it lacks. Columns are never dropped or
//! retyped.

pub mod ddl;
pub mod introspect;

pub use ddl::{add_column_sql, column_definition, column_modifiers, create_table_sql};
pub use introspect::{ColumnInfo, column_names, table_columns};

use cipherdb_core::{Connection, Error, FieldInfo, Model, Result};

/// A model's table shape, detached from the model type.
///
/// Lets a registry hold many models' schemas behind one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub fields: &'static [FieldInfo],
}

impl TableDef {
    /// Capture the table definition of `M`.
    #[must_use]
    pub fn of<M: Model>() -> Self {
        Self {
            name: M::TABLE_NAME,
            fields: M::fields(),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for this table.
    #[must_use]
    pub fn create_sql(&self) -> String {
        create_table_sql(self.name, self.fields)
    }
}

/// Outcome of [`sync_table`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The table did not exist and was created.
    pub created: bool,
    /// Columns appended with `ALTER TABLE ADD COLUMN`.
    pub added_columns: Vec<String>,
}

impl SyncReport {
    /// Whether the sync changed anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.created && self.added_columns.is_empty()
    }
}

/// Create `table` if missing, then add every declared column it lacks.
///
/// Callers are expected to run this inside a transaction so a failed
/// `ALTER TABLE` leaves the table untouched.
#[tracing::instrument(level = "debug", skip(conn, table), fields(table = table.name))]
pub fn sync_table<C: Connection + ?Sized>(conn: &C, table: &TableDef) -> Result<SyncReport> {
    if table.fields.is_empty() {
        return Err(Error::schema(format!(
            "table {} has no persisted fields",
            table.name
        )));
    }

    let mut report = SyncReport::default();

    if !conn.table_exists(table.name)? {
        conn.execute(&table.create_sql(), &[])?;
        report.created = true;
        tracing::debug!(table = table.name, "Created table");
        return Ok(report);
    }

    let existing = column_names(conn, table.name)?;
    for field in table.fields {
        if existing
            .iter()
            .any(|c| c.eq_ignore_ascii_case(field.column_name))
        {
            continue;
        }
        conn.execute(&add_column_sql(table.name, field), &[])?;
        tracing::debug!(table = table.name, column = field.column_name, "Added column");
        report.added_columns.push(field.column_name.to_string());
    }

    Ok(report)
}
