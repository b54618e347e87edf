//! Core traits for talking to the database.
//!
//! - [`Connection`]: the narrow capability the resilient executor needs from
//!   a live database connection
//!
//! Drivers implement the trait (see `drivers::mysql`); tests substitute a
//! scripted in-memory implementation.

use async_trait::async_trait;

use crate::error::DbError;

/// One result row. `None` is SQL NULL; everything else is its text form.
pub type Row = Vec<Option<String>>;

/// All rows returned by a statement. Empty for DDL.
pub type Rows = Vec<Row>;

/// A single live database connection.
///
/// Errors are returned as raw [`DbError`]s so the caller can classify them.
#[async_trait]
pub trait Connection: Send {
    /// Run one statement and return its rows.
    async fn execute(&mut self, sql: &str) -> Result<Rows, DbError>;

    /// Whether the connection is usable.
    async fn is_active(&mut self) -> bool;

    /// Replace the underlying connection.
    ///
    /// With `consistent_host` the new connection must reach the same
    /// physical server as the original one; otherwise any server behind the
    /// configured address is acceptable.
    async fn reconnect(&mut self, consistent_host: bool) -> Result<(), DbError>;

    /// Driver name for logging.
    fn db_type(&self) -> &str;
}
