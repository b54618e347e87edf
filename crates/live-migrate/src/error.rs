//! Error types for the migration library.

use std::fmt;

use thiserror::Error;

/// MySQL error code for `ER_LOCK_WAIT_TIMEOUT`.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

const LOCK_WAIT_TIMEOUT_MESSAGE: &str = "Lock wait timeout exceeded";

/// Exit codes reported by the CLI.
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_DATABASE_ERROR: u8 = 2;
pub const EXIT_CONNECTION_ERROR: u8 = 3;
pub const EXIT_SCHEMA_ERROR: u8 = 4;
pub const EXIT_TRANSFER_ERROR: u8 = 5;
pub const EXIT_IO_ERROR: u8 = 7;
pub const EXIT_CANCELLED: u8 = 130;

/// An error reported by the database server or its client library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// Server error code, `None` for client-side failures (I/O, protocol).
    pub code: Option<u16>,
    /// Human readable message.
    pub message: String,
}

impl DbError {
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A server-side error with a MySQL error code.
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::new(Some(code), message)
    }

    /// A client-side error without an error code.
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// The lock wait timeout error as MySQL reports it.
    pub fn lock_wait_timeout() -> Self {
        Self::server(
            ER_LOCK_WAIT_TIMEOUT,
            "Lock wait timeout exceeded; try restarting transaction",
        )
    }

    pub fn kind(&self) -> ErrorKind {
        classify(self)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "({}) {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DbError {}

/// Whether a database error is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Metadata-lock contention; reconnect, wait and try again.
    RetriableLockTimeout,
    /// Anything else. Never retried.
    Fatal,
}

/// Classify a database error.
///
/// Lock wait timeouts are the only retriable condition. They are recognized
/// by error code, or by message for drivers that do not surface the code.
pub fn classify(err: &DbError) -> ErrorKind {
    if err.code == Some(ER_LOCK_WAIT_TIMEOUT) || err.message.contains(LOCK_WAIT_TIMEOUT_MESSAGE)
    {
        ErrorKind::RetriableLockTimeout
    } else {
        ErrorKind::Fatal
    }
}

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error, either fatal or a retriable one that ran out of attempts
    #[error("Database error: {0}")]
    Database(#[source] DbError),

    /// Connection could not be (re)established or is not usable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Origin and destination have no column in common
    #[error("Tables {origin} and {destination} share no columns - nothing to replicate")]
    NoSharedColumns { origin: String, destination: String },

    /// Schema extraction failed
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Row copy failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl From<DbError> for MigrateError {
    fn from(err: DbError) -> Self {
        MigrateError::Database(err)
    }
}

impl MigrateError {
    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// The underlying database error, if any.
    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            MigrateError::Database(err) => Some(err),
            _ => None,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::Yaml(_)
            | MigrateError::Json(_)
            | MigrateError::NoSharedColumns { .. } => EXIT_CONFIG_ERROR,
            MigrateError::Database(_) => EXIT_DATABASE_ERROR,
            MigrateError::Connection(_) => EXIT_CONNECTION_ERROR,
            MigrateError::SchemaExtraction(_) => EXIT_SCHEMA_ERROR,
            MigrateError::Transfer { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_wait_timeout_by_code_is_retriable() {
        let err = DbError::server(1205, "whatever the server said");
        assert_eq!(classify(&err), ErrorKind::RetriableLockTimeout);
    }

    #[test]
    fn test_lock_wait_timeout_by_message_is_retriable() {
        let err = DbError::client("Lock wait timeout exceeded; try restarting transaction");
        assert_eq!(classify(&err), ErrorKind::RetriableLockTimeout);
    }

    #[test]
    fn test_read_only_is_fatal() {
        let err = DbError::server(
            1290,
            "The MySQL server is running with the --read-only option so it cannot execute this statement.",
        );
        assert_eq!(classify(&err), ErrorKind::Fatal);
    }

    #[test]
    fn test_syntax_and_permission_errors_are_fatal() {
        assert_eq!(
            DbError::server(1064, "You have an error in your SQL syntax").kind(),
            ErrorKind::Fatal
        );
        assert_eq!(
            DbError::server(1142, "TRIGGER command denied to user").kind(),
            ErrorKind::Fatal
        );
        assert_eq!(DbError::client("broken pipe").kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_db_error_display() {
        assert_eq!(DbError::server(1205, "boom").to_string(), "(1205) boom");
        assert_eq!(DbError::client("boom").to_string(), "boom");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(
            MigrateError::Database(DbError::lock_wait_timeout()).exit_code(),
            EXIT_DATABASE_ERROR
        );
        assert_eq!(MigrateError::Cancelled.exit_code(), EXIT_CANCELLED);
        assert_eq!(
            MigrateError::NoSharedColumns {
                origin: "a".into(),
                destination: "b".into()
            }
            .exit_code(),
            EXIT_CONFIG_ERROR
        );
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let err = MigrateError::Database(DbError::lock_wait_timeout());
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Database error:"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("Lock wait timeout exceeded"));
    }
}
