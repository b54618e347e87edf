//! # live-migrate
//!
//! Online schema changes for MySQL without blocking writes.
//!
//! A migration never alters the live table directly. Instead it:
//!
//! - **Creates a shadow table** (`lhmn_<table>`) with the new schema
//! - **Entangles** the two tables with insert/update/delete triggers so live
//!   writes are mirrored into the shadow table
//! - **Copies existing rows** in primary key chunks, throttled
//! - **Switches** the tables with one atomic `rename table`, archiving the
//!   old one as `lhma_<timestamp>_<table>`
//!
//! Every statement runs through a [`ResilientExecutor`], which retries
//! lock-wait timeouts with linear backoff and reconnects between attempts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use live_migrate::{Config, Migrator, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> live_migrate::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let mut orchestrator = Orchestrator::new(config).await?;
//! let migrator = Migrator::new("users")?.add_column("email", "varchar(255)");
//! let result = orchestrator.run(&migrator, &CancellationToken::new()).await?;
//! println!("archived old table as {}", result.archive);
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod config;
pub mod connection;
pub mod core;
pub mod drivers;
pub mod entangler;
pub mod error;
pub mod migrator;
pub mod orchestrator;
pub mod switcher;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use chunker::{Chunker, ChunkerOptions, CopyStats};
pub use config::{Config, ConnectionConfig, MigrationConfig, RetryConfig};
pub use connection::{ResilientExecutor, RetryPolicy};
pub use crate::core::{Column, Connection, Migration, Table};
pub use drivers::MysqlConnection;
pub use entangler::{Entangler, TriggerKind};
pub use error::{classify, DbError, ErrorKind, MigrateError, Result};
pub use migrator::{Change, Migrator};
pub use orchestrator::{MigrationResult, Orchestrator};
pub use switcher::AtomicSwitcher;
