//! Core abstractions for online migrations.
//!
//! - [`identifier`]: identifier validation, quoting and shortening
//! - [`schema`]: table and column metadata
//! - [`migration`]: origin/destination pairing and the shared-column list
//! - [`traits`]: the [`Connection`] capability drivers implement

pub mod identifier;
pub mod migration;
pub mod schema;
pub mod traits;

pub use migration::Migration;
pub use schema::{Column, Table};
pub use traits::{Connection, Row, Rows};
