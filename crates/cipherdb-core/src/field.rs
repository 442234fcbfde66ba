//! Field and column definitions.

use crate::types::SqlType;

/// Referential action for foreign key constraints (ON DELETE / ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Raise an error if any references exist.
    #[default]
    NoAction,
    /// Same as NO ACTION but checked immediately.
    Restrict,
    /// Delete/update referencing rows.
    Cascade,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their default values.
    SetDefault,
}

impl ReferentialAction {
    /// Get the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Metadata about a persisted model field.
///
/// Built in `static` context by `#[derive(Model)]`, so every builder method is
/// a `const fn`. Transient fields never get a `FieldInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (the field name unless aliased)
    pub column_name: &'static str,
    /// Storage class derived from the Rust type
    pub sql_type: SqlType,
    /// Declared type written verbatim into DDL instead of `sql_type`
    pub sql_type_override: Option<&'static str>,
    /// Whether the Rust type can hold NULL (`Option<T>`)
    pub nullable: bool,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Whether the key is generated by the engine (`AUTOINCREMENT`)
    pub auto_increment: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// NOT NULL constraint
    pub not_null: bool,
    /// DEFAULT expression (raw SQL)
    pub default: Option<&'static str>,
    /// CHECK expression (raw SQL, without the `CHECK` keyword)
    pub check: Option<&'static str>,
    /// Foreign key reference as `table.column`
    pub foreign_key: Option<&'static str>,
    /// ON DELETE action (only meaningful with `foreign_key`)
    pub on_delete: Option<ReferentialAction>,
    /// ON UPDATE action (only meaningful with `foreign_key`)
    pub on_update: Option<ReferentialAction>,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            column_name,
            sql_type,
            sql_type_override: None,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            not_null: false,
            default: None,
            check: None,
            foreign_key: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set explicit SQL type override.
    pub const fn sql_type_override(mut self, type_str: &'static str) -> Self {
        self.sql_type_override = Some(type_str);
        self
    }

    /// Set SQL type override from optional.
    pub const fn sql_type_override_opt(mut self, type_str: Option<&'static str>) -> Self {
        self.sql_type_override = type_str;
        self
    }

    /// Get the declared type used in DDL.
    #[must_use]
    pub fn effective_sql_type(&self) -> &'static str {
        match self.sql_type_override {
            Some(declared) => declared,
            None => self.sql_type.sql_name(),
        }
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set auto-increment flag.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Set unique flag.
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Set NOT NULL flag.
    pub const fn not_null(mut self, value: bool) -> Self {
        self.not_null = value;
        self
    }

    /// Set default value.
    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Set default value from optional.
    pub const fn default_opt(mut self, expr: Option<&'static str>) -> Self {
        self.default = expr;
        self
    }

    /// Set CHECK expression.
    pub const fn check(mut self, expr: &'static str) -> Self {
        self.check = Some(expr);
        self
    }

    /// Set CHECK expression from optional.
    pub const fn check_opt(mut self, expr: Option<&'static str>) -> Self {
        self.check = expr;
        self
    }

    /// Set foreign key reference (`table.column`).
    pub const fn foreign_key(mut self, reference: &'static str) -> Self {
        self.foreign_key = Some(reference);
        self
    }

    /// Set foreign key reference from optional.
    pub const fn foreign_key_opt(mut self, reference: Option<&'static str>) -> Self {
        self.foreign_key = reference;
        self
    }

    /// Set ON DELETE action for foreign key.
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    /// Set ON DELETE action from optional.
    pub const fn on_delete_opt(mut self, action: Option<ReferentialAction>) -> Self {
        self.on_delete = action;
        self
    }

    /// Set ON UPDATE action for foreign key.
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    /// Set ON UPDATE action from optional.
    pub const fn on_update_opt(mut self, action: Option<ReferentialAction>) -> Self {
        self.on_update = action;
        self
    }

    /// Split the foreign key reference into `(table, column)`.
    ///
    /// Returns `None` when no reference is declared or it is malformed.
    #[must_use]
    pub fn foreign_key_parts(&self) -> Option<(&'static str, &'static str)> {
        let reference = self.foreign_key?;
        let (table, column) = reference.split_once('.')?;
        if table.is_empty() || column.is_empty() {
            return None;
        }
        Some((table, column))
    }

    /// Whether the given name refers to this field, by Rust name or column alias.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.column_name.eq_ignore_ascii_case(name)
    }

    /// Whether the column has been renamed away from the field name.
    #[must_use]
    pub fn is_aliased(&self) -> bool {
        self.name != self.column_name
    }
}
