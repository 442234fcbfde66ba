//! SQLite / SQLCipher driver for cipherdb.
//!
//! Built on `rusqlite`. Enable the `encryption` feature to link SQLCipher
//! (with a vendored OpenSSL) so that `PRAGMA key` actually encrypts the file;
//! without it, opening with a key fails with `Error::Encryption`.

mod error;
mod value;

pub mod connection;
pub mod queue;

pub use connection::SqliteConnection;
pub use queue::DatabaseQueue;
