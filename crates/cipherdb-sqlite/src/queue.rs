//! Serialized access to one connection.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use cipherdb_core::{ConnectionError, ConnectionErrorKind, Result};

use crate::connection::SqliteConnection;

/// A single connection behind a mutex.
///
/// Every closure passed to [`DatabaseQueue::in_database`] or
/// [`DatabaseQueue::in_transaction`] runs with exclusive access. The closures
/// must not call back into the same queue: the lock is not re-entrant.
#[derive(Debug)]
pub struct DatabaseQueue {
    inner: Mutex<Option<SqliteConnection>>,
}

/// Rolls back an open transaction unless disarmed, including on unwind.
struct RollbackGuard<'a> {
    conn: &'a SqliteConnection,
    armed: bool,
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "ROLLBACK failed");
            } else {
                tracing::debug!("Transaction rolled back");
            }
        }
    }
}

impl DatabaseQueue {
    /// Wrap an open connection.
    pub fn new(conn: SqliteConnection) -> Self {
        Self {
            inner: Mutex::new(Some(conn)),
        }
    }

    /// Open a file database.
    pub fn open(path: impl AsRef<Path>, key: Option<&str>) -> Result<Self> {
        SqliteConnection::open(path, key).map(Self::new)
    }

    /// Open an in-memory database.
    pub fn open_in_memory(key: Option<&str>) -> Result<Self> {
        SqliteConnection::open_in_memory(key).map(Self::new)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<SqliteConnection>>> {
        self.inner.lock().map_err(|_| {
            ConnectionError::new(
                ConnectionErrorKind::Poisoned,
                "database queue poisoned by a panic",
            )
            .into()
        })
    }

    fn closed() -> cipherdb_core::Error {
        ConnectionError::new(ConnectionErrorKind::Closed, "database queue is closed").into()
    }

    /// Run `f` with exclusive access to the connection.
    pub fn in_database<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(Self::closed)?;
        f(conn)
    }

    /// Run `f` inside `BEGIN`/`COMMIT`; any `Err` (or panic) rolls back.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&SqliteConnection) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(Self::closed)?;

        conn.execute_batch("BEGIN")?;
        let mut tx = RollbackGuard { conn, armed: true };

        match f(tx.conn) {
            Ok(value) => {
                tx.conn.execute_batch("COMMIT")?;
                tx.armed = false;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Transaction failed");
                drop(tx);
                Err(e)
            }
        }
    }

    /// Open another database and swap it in for the current connection.
    ///
    /// The new connection is opened before the old one is released; if that
    /// fails the queue keeps the connection it had.
    #[tracing::instrument(level = "debug", skip(self, path, key), fields(path = %path.as_ref().display()))]
    pub fn reopen(&self, path: impl AsRef<Path>, key: Option<&str>) -> Result<()> {
        let mut guard = self.lock()?;
        let next = SqliteConnection::open(path, key)?;
        *guard = Some(next);
        Ok(())
    }

    /// Close the connection. Later calls fail with a `Closed` error.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if guard.take().is_some() {
            tracing::debug!("Database queue closed");
        }
        Ok(())
    }

    /// Whether a connection is currently held.
    pub fn is_open(&self) -> bool {
        self.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// File path of the current connection (`None` for in-memory).
    pub fn path(&self) -> Result<Option<PathBuf>> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(Self::closed)?;
        Ok(conn.path().map(Path::to_path_buf))
    }
}
