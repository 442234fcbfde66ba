//! SQLite DDL generation from model field metadata.

use cipherdb_core::{FieldInfo, quote_ident};

/// Render the constraint clauses for one column.
///
/// Order: `PRIMARY KEY`, `AUTOINCREMENT`, `UNIQUE`, `NOT NULL`, `CHECK`,
/// `DEFAULT`, `REFERENCES`. Returns an empty string when the field declares
/// nothing.
#[must_use]
pub fn column_modifiers(field: &FieldInfo) -> String {
    let mut parts: Vec<String> = Vec::new();

    if field.primary_key {
        parts.push("PRIMARY KEY".to_string());
        if field.auto_increment {
            parts.push("AUTOINCREMENT".to_string());
        }
    }
    if field.unique {
        parts.push("UNIQUE".to_string());
    }
    if field.not_null {
        parts.push("NOT NULL".to_string());
    }
    if let Some(check) = field.check {
        parts.push(format!("CHECK ({check})"));
    }
    if let Some(default) = field.default {
        parts.push(format!("DEFAULT {default}"));
    }
    if let Some((table, column)) = field.foreign_key_parts() {
        let mut fk = format!("REFERENCES {} ({})", quote_ident(table), quote_ident(column));
        if let Some(action) = field.on_delete {
            fk.push_str(" ON DELETE ");
            fk.push_str(action.as_sql());
        }
        if let Some(action) = field.on_update {
            fk.push_str(" ON UPDATE ");
            fk.push_str(action.as_sql());
        }
        parts.push(fk);
    }

    parts.join(" ")
}

/// `"column" TYPE modifiers`
#[must_use]
pub fn column_definition(field: &FieldInfo) -> String {
    let modifiers = column_modifiers(field);
    let mut def = format!(
        "{} {}",
        quote_ident(field.column_name),
        field.effective_sql_type()
    );
    if !modifiers.is_empty() {
        def.push(' ');
        def.push_str(&modifiers);
    }
    def
}

/// Generate `CREATE TABLE IF NOT EXISTS` for a table.
#[must_use]
pub fn create_table_sql(table: &str, fields: &[FieldInfo]) -> String {
    let columns: Vec<String> = fields.iter().map(column_definition).collect();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table),
        columns.join(", ")
    );
    tracing::trace!(sql = %sql, "Generated SQLite DDL statement");
    sql
}

/// Generate `ALTER TABLE .. ADD COLUMN` for a column missing from a live table.
///
/// SQLite rejects PRIMARY KEY and UNIQUE on added columns and only accepts
/// NOT NULL together with a non-NULL default, so those are the only
/// constraints carried over.
#[must_use]
pub fn add_column_sql(table: &str, field: &FieldInfo) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(field.column_name),
        field.effective_sql_type()
    );
    if let Some(default) = field.default {
        if field.not_null {
            sql.push_str(" NOT NULL");
        }
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    tracing::trace!(sql = %sql, "Generated SQLite DDL statement");
    sql
}
