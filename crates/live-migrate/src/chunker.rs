//! Row copy from the origin to the shadow table.
//!
//! Rows that exist when the copy starts are moved in primary key ranges of
//! at most `stride` values with `insert ignore ... select`, each range
//! starting at the next existing key so gaps are skipped. Rows written
//! after the triggers went in reach the shadow table through the triggers;
//! `insert ignore` keeps the copy from overwriting them.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::MigrationConfig;
use crate::connection::ResilientExecutor;
use crate::core::identifier::{quote_list, quote_mysql};
use crate::core::Migration;
use crate::entangler::MIGRATION_TAG;
use crate::error::{MigrateError, Result};

/// Row copy settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerOptions {
    /// Primary key values covered by one chunk.
    pub stride: u64,
    /// Pause between chunks, to leave room for replication and live traffic.
    pub throttle: Duration,
}

impl Default for ChunkerOptions {
    fn default() -> Self {
        Self {
            stride: 2000,
            throttle: Duration::from_millis(100),
        }
    }
}

impl From<&MigrationConfig> for ChunkerOptions {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            stride: config.stride.max(1),
            throttle: config.throttle(),
        }
    }
}

/// Outcome of a copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub chunks: u64,
    /// Smallest and largest primary key at the start, `None` for an empty table.
    pub bounds: Option<(i64, i64)>,
}

/// The chunk starting at `start`: at most `stride` keys, never past `max`.
pub fn chunk_end(start: i64, max: i64, stride: u64) -> i64 {
    let step = i64::try_from(stride.max(1)).unwrap_or(i64::MAX);
    start.saturating_add(step - 1).min(max)
}

/// Copies existing rows for one migration.
pub struct Chunker<'a> {
    migration: &'a Migration,
    options: ChunkerOptions,
}

impl<'a> Chunker<'a> {
    pub fn new(migration: &'a Migration, options: ChunkerOptions) -> Self {
        Self { migration, options }
    }

    /// The copy statement for one inclusive range.
    pub fn copy_statement(&self, start: i64, end: i64) -> Result<String> {
        let columns = quote_list(&self.migration.intersection()?)?;
        Ok(format!(
            "insert ignore into {dest} ({columns}) {tag} select {columns} from {origin} \
             where {pk} between {start} and {end}",
            dest = quote_mysql(self.migration.destination.name())?,
            columns = columns,
            tag = MIGRATION_TAG,
            origin = quote_mysql(self.migration.origin.name())?,
            pk = quote_mysql(&self.migration.origin.primary_key)?,
            start = start,
            end = end,
        ))
    }

    /// Smallest and largest primary key, `None` when the table is empty.
    pub async fn bounds(&self, exec: &mut ResilientExecutor) -> Result<Option<(i64, i64)>> {
        let pk = quote_mysql(&self.migration.origin.primary_key)?;
        let sql = format!(
            "select min({pk}), max({pk}) from {origin}",
            pk = pk,
            origin = quote_mysql(self.migration.origin.name())?
        );
        let rows = exec.execute(&sql).await?;
        let row = rows.first().map(Vec::as_slice).unwrap_or_default();

        match row {
            [Some(min), Some(max)] => Ok(Some((
                self.parse_key(min)?,
                self.parse_key(max)?,
            ))),
            _ => Ok(None),
        }
    }

    /// Copy all rows, stopping between chunks if `cancel` fires.
    pub async fn run(
        &self,
        exec: &mut ResilientExecutor,
        cancel: &CancellationToken,
    ) -> Result<CopyStats> {
        // Fail before reading anything if there is nothing to copy into.
        self.migration.intersection()?;

        let (min, max) = match self.bounds(exec).await? {
            Some(bounds) => bounds,
            None => {
                info!("{} is empty, nothing to copy", self.migration.origin.name());
                return Ok(CopyStats::default());
            }
        };

        let started = Instant::now();
        let mut chunks: u64 = 0;
        let mut start = min;

        loop {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            let end = chunk_end(start, max, self.options.stride);
            exec.execute(&self.copy_statement(start, end)?).await?;
            chunks += 1;
            debug!(
                "{}: copied chunk {} ({}..={} of {})",
                self.migration.origin.name(),
                chunks,
                start,
                end,
                max
            );

            if end >= max {
                break;
            }
            // Jump over key gaps instead of walking them stride by stride.
            start = match self.next_key(exec, end).await? {
                Some(next) if next <= max => next,
                _ => break,
            };

            if !self.options.throttle.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.throttle) => {}
                    _ = cancel.cancelled() => return Err(MigrateError::Cancelled),
                }
            }
        }

        info!(
            "Copied {} chunk(s) from {} to {} in {:?}",
            chunks,
            self.migration.origin.name(),
            self.migration.destination.name(),
            started.elapsed()
        );
        Ok(CopyStats {
            chunks,
            bounds: Some((min, max)),
        })
    }

    /// Smallest primary key above `after`, `None` when there is none.
    pub async fn next_key(&self, exec: &mut ResilientExecutor, after: i64) -> Result<Option<i64>> {
        let pk = quote_mysql(&self.migration.origin.primary_key)?;
        let sql = format!(
            "select min({pk}) from {origin} where {pk} > {after}",
            pk = pk,
            origin = quote_mysql(self.migration.origin.name())?,
            after = after
        );
        let rows = exec.execute(&sql).await?;
        match rows.first().and_then(|row| row.first()) {
            Some(Some(value)) => Ok(Some(self.parse_key(value)?)),
            _ => Ok(None),
        }
    }

    fn parse_key(&self, value: &str) -> Result<i64> {
        value.trim().parse().map_err(|_| {
            MigrateError::transfer(
                self.migration.origin.name(),
                format!(
                    "primary key {} is not an integer ({:?})",
                    self.migration.origin.primary_key, value
                ),
            )
        })
    }
}
