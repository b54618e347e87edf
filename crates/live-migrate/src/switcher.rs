//! Atomic replacement of the origin table by the shadow table.
//!
//! A single `rename table a to b, c to d` is atomic in MySQL: readers and
//! writers either see the old table or the new one under the origin name,
//! never neither.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::connection::ResilientExecutor;
use crate::core::identifier::{quote_mysql, shorten};
use crate::core::Migration;
use crate::drivers::mysql::introspect::{self, ARCHIVE_PREFIX};
use crate::error::{MigrateError, Result};

/// Renames origin to an archive name and the shadow table to origin.
pub struct AtomicSwitcher<'a> {
    migration: &'a Migration,
    archive: String,
}

impl<'a> AtomicSwitcher<'a> {
    pub fn new(migration: &'a Migration) -> Self {
        Self::at(migration, Utc::now())
    }

    /// Use `now` for the archive timestamp.
    pub fn at(migration: &'a Migration, now: DateTime<Utc>) -> Self {
        let archive = archive_name(migration.origin.name(), now);
        Self { migration, archive }
    }

    /// Name the origin table is archived under.
    pub fn archive(&self) -> &str {
        &self.archive
    }

    pub fn statement(&self) -> Result<String> {
        let origin = quote_mysql(self.migration.origin.name())?;
        Ok(format!(
            "rename table {origin} to {archive}, {dest} to {origin}",
            origin = origin,
            archive = quote_mysql(&self.archive)?,
            dest = quote_mysql(self.migration.destination.name())?,
        ))
    }

    /// Check both tables are still there, then swap them.
    pub async fn run(&self, exec: &mut ResilientExecutor) -> Result<()> {
        for table in [&self.migration.origin, &self.migration.destination] {
            if !introspect::table_exists(exec, table.name()).await? {
                return Err(MigrateError::SchemaExtraction(format!(
                    "{} disappeared before the switch",
                    table.name()
                )));
            }
        }

        exec.execute(&self.statement()?).await?;
        info!(
            "Switched {} -> {}, archived as {}",
            self.migration.destination.name(),
            self.migration.origin.name(),
            self.archive
        );
        Ok(())
    }
}

/// `lhma_<timestamp>_<origin>`, at most 64 characters.
pub fn archive_name(origin: &str, now: DateTime<Utc>) -> String {
    let prefix = format!("{}{}_", ARCHIVE_PREFIX, now.format("%Y_%m_%d_%H_%M_%S_%3f"));
    shorten(&prefix, origin)
}
