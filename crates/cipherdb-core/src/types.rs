//! SQL storage classes and the mapping from Rust types onto them.

use serde::{Deserialize, Serialize};

/// SQLite storage class used for a column's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// UTF-8 text.
    Text,
    /// Signed 64-bit integer (also used for booleans).
    Integer,
    /// IEEE 754 double.
    Real,
    /// Raw bytes.
    Blob,
}

impl SqlType {
    /// Get the SQL type name as written in DDL.
    #[must_use]
    pub const fn sql_name(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    /// Parse a declared column type using SQLite's affinity rules.
    ///
    /// `INT` anywhere in the name gives INTEGER; `CHAR`, `CLOB` or `TEXT` give
    /// TEXT; `BLOB` or an empty declaration give BLOB; everything else is REAL.
    #[must_use]
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            SqlType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            SqlType::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            SqlType::Blob
        } else {
            SqlType::Real
        }
    }

    /// Whether values of this type are text.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Text)
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// Compile-time mapping of a Rust type onto its column type.
///
/// The derive macro reads `SQL_TYPE` and `NULLABLE` in a `static` context,
/// so implementations must be plain constants.
pub trait HasSqlType {
    /// Storage class for the column.
    const SQL_TYPE: SqlType;
    /// Whether the Rust type can hold SQL `NULL`.
    const NULLABLE: bool = false;
}

macro_rules! impl_has_sql_type {
    ($sql:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl HasSqlType for $ty {
                const SQL_TYPE: SqlType = $sql;
            }
        )+
    };
}

impl_has_sql_type!(SqlType::Text => String, char);
impl_has_sql_type!(SqlType::Integer => bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
impl_has_sql_type!(SqlType::Real => f32, f64);
impl_has_sql_type!(SqlType::Blob => Vec<u8>);
impl_has_sql_type!(SqlType::Text => serde_json::Value);

impl<T: HasSqlType> HasSqlType for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;
}
