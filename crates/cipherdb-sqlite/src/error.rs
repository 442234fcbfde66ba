//! rusqlite error mapping.
//!
//! - constraint violations → `QueryErrorKind::Constraint`
//! - `SQLITE_NOTADB` (wrong key, or not a database) → `Error::Encryption`
//! - `SQLITE_CANTOPEN` → `ConnectionErrorKind::Open`
//! - generic SQL errors (syntax, unknown table/column) → `QueryErrorKind::Prepare`
//! - everything else → `QueryErrorKind::Database`

use cipherdb_core::{
    ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind,
};
use rusqlite::ErrorCode;

pub(crate) fn map_error(err: rusqlite::Error, sql: Option<&str>) -> Error {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => QueryErrorKind::Constraint,
            ErrorCode::NotADatabase => {
                return Error::Encryption(format!(
                    "cannot read database (wrong key or not a database): {err}"
                ));
            }
            ErrorCode::CannotOpen => {
                return ConnectionError::new(ConnectionErrorKind::Open, err.to_string()).into();
            }
            ErrorCode::Unknown => QueryErrorKind::Prepare,
            _ => QueryErrorKind::Database,
        },
        _ => QueryErrorKind::Database,
    };

    let mut query_error = QueryError::new(kind, err.to_string());
    if let Some(sql) = sql {
        query_error = query_error.with_sql(sql);
    }
    query_error.into()
}
