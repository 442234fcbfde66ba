//! Error types shared by every cipherdb crate.

use thiserror::Error as ThisError;

/// Result alias used throughout cipherdb.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Opening, reopening or using a closed connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The database could not be unlocked with the configured key, or the
    /// linked engine has no cipher support where one is required.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The engine rejected a statement.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Table creation or column sync failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// A stored value could not be converted into the requested Rust type.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// The model metadata does not support the requested operation
    /// (for example updating a model without a primary key).
    #[error("model error: {0}")]
    Model(String),

    /// A condition referenced an unknown field or used an unsupported operator.
    #[error("criteria error: {0}")]
    Criteria(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Construct a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Error::Model(message.into())
    }

    /// Construct a criteria error.
    pub fn criteria(message: impl Into<String>) -> Self {
        Error::Criteria(message.into())
    }

    /// Construct a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// Whether this error is a constraint violation (UNIQUE, NOT NULL, CHECK, FK).
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Query(QueryError {
                kind: QueryErrorKind::Constraint,
                ..
            })
        )
    }
}

/// Classification of connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// The database file could not be opened.
    Open,
    /// The queue has been closed.
    Closed,
    /// The connection mutex was poisoned by a panicking holder.
    Poisoned,
}

/// Connection failure.
#[derive(Debug, ThisError)]
#[error("connection error ({kind:?}): {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Classification of statement failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Constraint violation.
    Constraint,
    /// SQL could not be prepared (syntax, unknown table or column).
    Prepare,
    /// Any other engine error.
    Database,
}

/// Statement failure reported by the engine.
#[derive(Debug, ThisError)]
#[error("query error ({kind:?}): {message}{}", .sql.as_deref().map(|s| format!(" [sql: {s}]")).unwrap_or_default())]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    pub sql: Option<String>,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
        }
    }

    /// Attach the offending SQL.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

/// Value conversion failure.
#[derive(Debug, ThisError)]
#[error("cannot convert {actual} into {expected}{}", .column.as_deref().map(|c| format!(" (column {c})")).unwrap_or_default())]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

impl TypeError {
    pub fn new(expected: &'static str, actual: impl Into<String>) -> Self {
        Self {
            expected,
            actual: actual.into(),
            column: None,
        }
    }

    /// Attach the column being read.
    pub fn in_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}
