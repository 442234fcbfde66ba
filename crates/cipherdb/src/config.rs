//! Database location, key and logging configuration.
//!
//! Built in code through the builder methods, read from `CIPHERDB_*`
//! environment variables, or deserialized with serde as part of an
//! application's own config file.

use std::path::{Path, PathBuf};

use cipherdb_core::{Error, Result};
use serde::Deserialize;

/// Default directory created under `base_dir`.
pub const DEFAULT_DIRECTORY: &str = "cipherdb";
/// Default database file name.
pub const DEFAULT_FILE_NAME: &str = "cipherdb.sqlite";

/// An encryption passphrase. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw passphrase, for handing to `PRAGMA key`.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl From<&str> for SecretKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SecretKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Configuration for opening a [`Database`](crate::Database).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Parent of the database directory (default: current directory).
    pub base_dir: PathBuf,
    /// Directory holding the database file (default: `cipherdb`).
    pub directory_name: String,
    /// Database file name (default: `cipherdb.sqlite`).
    pub file_name: String,
    /// SQLCipher passphrase. `None` opens an unencrypted database.
    pub encryption_key: Option<SecretKey>,
    /// Emit per-statement success/failure events at `info` instead of `debug`.
    pub enable_logging: bool,
    /// Use a private in-memory database instead of a file.
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            directory_name: DEFAULT_DIRECTORY.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            encryption_key: None,
            enable_logging: false,
            in_memory: false,
        }
    }
}

impl DatabaseConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parent directory.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Set the database directory name.
    pub fn directory(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    /// Set the database file name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Set the encryption passphrase.
    pub fn key(mut self, key: impl Into<SecretKey>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    /// Toggle `info`-level statement logging.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Toggle the in-memory database.
    pub fn in_memory(mut self, enabled: bool) -> Self {
        self.in_memory = enabled;
        self
    }

    /// Read `CIPHERDB_BASE_DIR`, `CIPHERDB_DIRECTORY`, `CIPHERDB_FILE`,
    /// `CIPHERDB_KEY` and `CIPHERDB_LOG` on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`DatabaseConfig::from_env`], with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup("CIPHERDB_BASE_DIR") {
            config.base_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup("CIPHERDB_DIRECTORY") {
            config.directory_name = name;
        }
        if let Some(file) = lookup("CIPHERDB_FILE") {
            config.file_name = file;
        }
        if let Some(key) = lookup("CIPHERDB_KEY") {
            config.encryption_key = Some(SecretKey(key));
        }
        if let Some(flag) = lookup("CIPHERDB_LOG") {
            config.enable_logging = parse_flag("CIPHERDB_LOG", &flag)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject file and directory names that would escape `base_dir`.
    pub fn validate(&self) -> Result<()> {
        for (what, value) in [
            ("directory name", &self.directory_name),
            ("file name", &self.file_name),
        ] {
            if value.contains(['/', '\\']) || value == ".." {
                return Err(Error::Config(format!(
                    "{what} `{value}` must be a single path component"
                )));
            }
        }
        Ok(())
    }

    /// The passphrase, if one is set and non-empty.
    pub fn key_str(&self) -> Option<&str> {
        self.encryption_key
            .as_ref()
            .map(SecretKey::expose)
            .filter(|k| !k.is_empty())
    }

    /// `base_dir/directory_name`, falling back to the default directory name
    /// when it is empty.
    pub fn database_dir(&self) -> PathBuf {
        let name = if self.directory_name.trim().is_empty() {
            DEFAULT_DIRECTORY
        } else {
            self.directory_name.as_str()
        };
        self.base_dir.join(name)
    }

    /// Full database file path. Creates the directory if it does not exist.
    pub fn database_path(&self) -> Result<PathBuf> {
        self.validate()?;
        let dir = self.database_dir();
        ensure_dir(&dir)?;
        let file = if self.file_name.trim().is_empty() {
            DEFAULT_FILE_NAME
        } else {
            self.file_name.as_str()
        };
        Ok(dir.join(file))
    }

    /// The same configuration pointed at another directory.
    pub fn with_directory(&self, name: impl Into<String>) -> Self {
        self.clone().directory(name)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        tracing::debug!(dir = %dir.display(), "Created database directory");
    }
    Ok(())
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!(
            "{name} must be a boolean, got `{other}`"
        ))),
    }
}
