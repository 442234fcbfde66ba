//! Reading the live schema back out of SQLite.

use cipherdb_core::{Connection, Result, Row, SqlType, quote_ident};

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type text (may be empty).
    pub declared_type: String,
    /// Storage class derived from the declared type.
    pub sql_type: SqlType,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    fn from_pragma_row(row: &Row) -> Result<Self> {
        let declared_type: String = row.get_named("type")?;
        Ok(Self {
            name: row.get_named("name")?,
            sql_type: SqlType::from_declared(&declared_type),
            declared_type,
            not_null: row.get_named::<i64>("notnull")? != 0,
            default: row.get_named("dflt_value")?,
            primary_key: row.get_named::<i64>("pk")? != 0,
        })
    }
}

/// List the columns of `table` in declaration order.
///
/// A missing table yields an empty list.
#[tracing::instrument(level = "debug", skip(conn))]
pub fn table_columns<C: Connection + ?Sized>(conn: &C, table: &str) -> Result<Vec<ColumnInfo>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let rows = conn.query(&sql, &[])?;
    let columns = rows
        .iter()
        .map(ColumnInfo::from_pragma_row)
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(table, count = columns.len(), "Introspected table columns");
    Ok(columns)
}

/// Just the column names of `table`.
pub fn column_names<C: Connection + ?Sized>(conn: &C, table: &str) -> Result<Vec<String>> {
    Ok(table_columns(conn, table)?
        .into_iter()
        .map(|c| c.name)
        .collect())
}
