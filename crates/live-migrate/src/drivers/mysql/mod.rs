//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlConnection`]: the `Connection` used by the resilient executor
//! - [`introspect`]: table metadata and leftover discovery via `information_schema`
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+ (multiple triggers per event need 5.7.2+)
//! - MariaDB 10.2+

mod connection;
pub mod introspect;

pub use connection::MysqlConnection;
