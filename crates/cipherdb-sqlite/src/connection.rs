//! Keyed SQLite connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cipherdb_core::{Connection, Error, Result, Row, Value};
use rusqlite::OptionalExtension;

use crate::error::map_error;
use crate::value::{from_value_ref, params};

/// A single SQLite (or SQLCipher) connection.
///
/// When opened with a key, `PRAGMA key` is issued before anything else and
/// the key is checked by reading `sqlite_master`.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    path: Option<PathBuf>,
    keyed: bool,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("keyed", &self.keyed)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open (creating if needed) the database file at `path`.
    #[tracing::instrument(level = "debug", skip(path, key), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, key: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path).map_err(|e| map_error(e, None))?;
        Self::init(conn, Some(path.to_path_buf()), key)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory(key: Option<&str>) -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| map_error(e, None))?;
        Self::init(conn, None, key)
    }

    fn init(conn: rusqlite::Connection, path: Option<PathBuf>, key: Option<&str>) -> Result<Self> {
        let keyed = key.is_some();
        if let Some(key) = key {
            // Plain SQLite accepts `PRAGMA key` and silently stores plaintext.
            if cipher_version(&conn)?.is_none() {
                return Err(Error::Encryption(
                    "encryption key supplied but SQLite was built without SQLCipher".to_string(),
                ));
            }
            conn.pragma_update(None, "key", key)
                .map_err(|e| map_error(e, Some("PRAGMA key")))?;
        }

        // Any read fails with SQLITE_NOTADB when the key does not match.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| map_error(e, Some("SELECT count(*) FROM sqlite_master")))?;

        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| map_error(e, Some("PRAGMA foreign_keys")))?;

        let this = Self { conn, path, keyed };
        tracing::debug!(path = ?this.path, keyed, "Opened SQLite connection");
        Ok(this)
    }

    /// Database file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the connection was opened with a key.
    pub fn is_keyed(&self) -> bool {
        self.keyed
    }

    /// SQLCipher version, or `None` when the linked SQLite has no cipher support.
    pub fn cipher_version(&self) -> Result<Option<String>> {
        cipher_version(&self.conn)
    }

    /// Re-encrypt the database with a new key.
    #[tracing::instrument(level = "debug", skip(self, new_key))]
    pub fn rekey(&mut self, new_key: &str) -> Result<()> {
        if self.cipher_version()?.is_none() {
            return Err(Error::Encryption(
                "rekey requires SQLCipher support".to_string(),
            ));
        }
        self.conn
            .pragma_update(None, "rekey", new_key)
            .map_err(|e| map_error(e, Some("PRAGMA rekey")))?;
        self.keyed = true;
        tracing::info!(path = ?self.path, "Database rekeyed");
        Ok(())
    }

    /// Run one or more statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::trace!(sql, "execute_batch");
        self.conn
            .execute_batch(sql)
            .map_err(|e| map_error(e, Some(sql)))
    }

    /// Number of rows changed by the most recent statement.
    pub fn changes(&self) -> u64 {
        self.conn.changes()
    }
}

impl Connection for SqliteConnection {
    fn execute(&self, sql: &str, values: &[Value]) -> Result<u64> {
        tracing::trace!(sql, params = values.len(), "execute");
        let changed = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params(values)))
            .map_err(|e| map_error(e, Some(sql)))?;
        Ok(changed as u64)
    }

    fn insert(&self, sql: &str, values: &[Value]) -> Result<i64> {
        self.execute(sql, values)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn query(&self, sql: &str, values: &[Value]) -> Result<Vec<Row>> {
        tracing::trace!(sql, params = values.len(), "query");
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| map_error(e, Some(sql)))?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params(values)))
            .map_err(|e| map_error(e, Some(sql)))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| map_error(e, Some(sql)))? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(from_value_ref))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| map_error(e, Some(sql)))?;
            out.push(Row::new(Arc::clone(&columns), values));
        }
        Ok(out)
    }
}

fn cipher_version(conn: &rusqlite::Connection) -> Result<Option<String>> {
    conn.query_row("PRAGMA cipher_version", [], |row| row.get::<_, String>(0))
        .optional()
        .map_err(|e| map_error(e, Some("PRAGMA cipher_version")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cipherdb_core::QueryErrorKind;

    fn setup() -> SqliteConnection {
        let conn = SqliteConnection::open_in_memory(None).unwrap();
        conn.execute_batch(
            "CREATE TABLE heroes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE, \
             age INTEGER, power REAL, avatar BLOB)",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_insert_returns_rowid_and_query_reads_back() {
        let conn = setup();
        let id = conn
            .insert(
                "INSERT INTO heroes (name, age, power, avatar) VALUES (?1, ?2, ?3, ?4)",
                &[
                    Value::from("Deadpond"),
                    Value::Null,
                    Value::Real(9.5),
                    Value::Blob(vec![1, 2, 3]),
                ],
            )
            .unwrap();
        assert_eq!(id, 1);

        let rows = conn
            .query("SELECT id, name, age, power, avatar FROM heroes WHERE id = ?1", &[
                Value::Integer(id),
            ])
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get_named::<String>("name").unwrap(), "Deadpond");
        assert_eq!(row.get_named::<Option<i64>>("age").unwrap(), None);
        assert_eq!(row.get_value("power"), Some(&Value::Real(9.5)));
        assert_eq!(row.get_value("avatar"), Some(&Value::Blob(vec![1, 2, 3])));
    }

    #[test]
    fn test_unique_violation_is_constraint_error() {
        let conn = setup();
        let sql = "INSERT INTO heroes (name) VALUES (?1)";
        conn.insert(sql, &[Value::from("Solo")]).unwrap();
        let err = conn.insert(sql, &[Value::from("Solo")]).unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_unknown_table_is_prepare_error() {
        let conn = setup();
        let err = conn.query("SELECT * FROM villains", &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Query(cipherdb_core::QueryError {
                kind: QueryErrorKind::Prepare,
                ..
            })
        ));
    }

    #[test]
    fn test_execute_reports_changes() {
        let conn = setup();
        for name in ["a", "b", "c"] {
            conn.insert("INSERT INTO heroes (name) VALUES (?1)", &[Value::from(name)])
                .unwrap();
        }
        let changed = conn
            .execute("UPDATE heroes SET age = ?1", &[Value::Integer(30)])
            .unwrap();
        assert_eq!(changed, 3);
        assert_eq!(conn.changes(), 3);
    }

    #[test]
    fn test_table_exists() {
        let conn = setup();
        assert!(conn.table_exists("heroes").unwrap());
        assert!(conn.table_exists("HEROES").unwrap());
        assert!(!conn.table_exists("villains").unwrap());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.sqlite");
        {
            let conn = SqliteConnection::open(&path, None).unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
            conn.insert("INSERT INTO t (x) VALUES (?1)", &[Value::Integer(7)])
                .unwrap();
            assert_eq!(conn.path(), Some(path.as_path()));
        }
        let conn = SqliteConnection::open(&path, None).unwrap();
        let row = conn.query_one("SELECT x FROM t", &[]).unwrap().unwrap();
        assert_eq!(row.get_as::<i64>(0).unwrap(), 7);
    }

    #[cfg(not(feature = "encryption"))]
    #[test]
    fn test_plain_build_refuses_a_key() {
        let conn = SqliteConnection::open_in_memory(None).unwrap();
        assert_eq!(conn.cipher_version().unwrap(), None);

        let err = SqliteConnection::open_in_memory(Some("secret")).unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.sqlite");
        assert!(SqliteConnection::open(&path, Some("secret")).is_err());
        assert!(std::fs::metadata(&path).map_or(true, |m| m.len() == 0));
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn test_wrong_key_is_encryption_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.sqlite");
        {
            let conn = SqliteConnection::open(&path, Some("right horse")).unwrap();
            assert!(conn.cipher_version().unwrap().is_some());
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        }
        let err = SqliteConnection::open(&path, Some("wrong horse")).unwrap_err();
        assert!(matches!(err, Error::Encryption(_)));
        assert!(SqliteConnection::open(&path, Some("right horse")).is_ok());
    }

    #[cfg(feature = "encryption")]
    #[test]
    fn test_rekey() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rekey.sqlite");
        {
            let mut conn = SqliteConnection::open(&path, Some("old")).unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
            conn.rekey("new").unwrap();
        }
        assert!(SqliteConnection::open(&path, Some("old")).is_err());
        let conn = SqliteConnection::open(&path, Some("new")).unwrap();
        assert!(conn.table_exists("t").unwrap());
    }
}
