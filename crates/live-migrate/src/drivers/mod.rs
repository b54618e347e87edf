//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB connection and schema introspection
//!
//! Each driver implements the core `Connection` trait. Everything above the
//! driver only sees `ResilientExecutor`.

pub mod mysql;

pub use mysql::MysqlConnection;
