//! Migration orchestrator - main workflow coordinator.
//!
//! Owns the one [`ResilientExecutor`] of a run and lends it to each phase:
//!
//! 1. create and alter the shadow table ([`Migrator`])
//! 2. install the mirroring triggers ([`Entangler::before`])
//! 3. copy existing rows ([`Chunker`])
//! 4. swap the tables ([`AtomicSwitcher`])
//! 5. remove the triggers ([`Entangler::after`])
//!
//! The swap happens while the triggers are still installed. Dropping them
//! first would leave a gap in which origin writes never reach the shadow
//! table. After the rename the triggers sit on the archived table, which
//! no longer receives writes.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chunker::{Chunker, ChunkerOptions};
use crate::config::Config;
use crate::connection::ResilientExecutor;
use crate::core::identifier::quote_mysql;
use crate::core::Migration;
use crate::drivers::mysql::introspect;
use crate::drivers::MysqlConnection;
use crate::entangler::Entangler;
use crate::error::{MigrateError, Result};
use crate::migrator::Migrator;
use crate::switcher::AtomicSwitcher;

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    exec: ResilientExecutor,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Table that was migrated.
    pub origin: String,

    /// Shadow table that replaced it.
    pub destination: String,

    /// Name the old table was archived under.
    pub archive: String,

    /// Columns mirrored and copied.
    pub shared_columns: Vec<String>,

    /// Number of copy chunks.
    pub chunks: u64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl Orchestrator {
    /// Connect to MySQL and create an orchestrator.
    pub async fn new(config: Config) -> Result<Self> {
        let conn = MysqlConnection::connect(&config.connection).await?;
        let exec = ResilientExecutor::new(Box::new(conn), config.retry.policy());
        Ok(Self::with_executor(config, exec))
    }

    /// Create an orchestrator around an existing executor.
    pub fn with_executor(config: Config, exec: ResilientExecutor) -> Self {
        Self { config, exec }
    }

    /// Check the connection answers queries.
    pub async fn health_check(&mut self) -> Result<()> {
        self.exec.execute("select 1").await?;
        if !self.exec.is_active().await {
            return Err(MigrateError::Connection("ping failed".into()));
        }
        info!("{} connection is healthy", self.exec.db_type());
        Ok(())
    }

    /// Run a complete migration.
    pub async fn run(
        &mut self,
        migrator: &Migrator,
        cancel: &CancellationToken,
    ) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();

        info!(
            "Phase 1: creating {} for {}",
            migrator.destination(),
            migrator.origin()
        );
        let migration = migrator.run(&mut self.exec).await?;

        info!("Phase 2: installing triggers");
        let entangler = Entangler::new(&migration);
        // A failure here leaves already created triggers for `cleanup`.
        entangler.before(&mut self.exec).await?;

        let copied = self.copy_and_switch(&migration, cancel).await;
        let (chunks, archive) = match copied {
            Ok(done) => done,
            Err(e) => {
                warn!("Migration of {} failed, removing triggers: {}", migrator.origin(), e);
                if let Err(cleanup) = entangler.after(&mut self.exec).await {
                    error!(
                        "Could not remove triggers for {}, run cleanup: {}",
                        migrator.origin(),
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        info!("Phase 5: removing triggers");
        entangler.after(&mut self.exec).await?;

        let completed_at = Utc::now();
        let result = MigrationResult {
            origin: migration.origin.name().to_string(),
            destination: migration.destination.name().to_string(),
            archive,
            shared_columns: migration.shared_columns(),
            chunks,
            started_at,
            completed_at,
            duration_seconds: timer.elapsed().as_secs_f64(),
        };
        info!(
            "Migrated {} in {:.1}s ({} chunks), old table archived as {}",
            result.origin, result.duration_seconds, result.chunks, result.archive
        );
        Ok(result)
    }

    async fn copy_and_switch(
        &mut self,
        migration: &Migration,
        cancel: &CancellationToken,
    ) -> Result<(u64, String)> {
        info!("Phase 3: copying rows");
        let options = ChunkerOptions::from(&self.config.migration);
        let stats = Chunker::new(migration, options)
            .run(&mut self.exec, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        info!("Phase 4: switching tables");
        let switcher = AtomicSwitcher::new(migration);
        switcher.run(&mut self.exec).await?;
        Ok((stats.chunks, switcher.archive().to_string()))
    }

    /// Leftover triggers and shadow/archive tables from earlier runs.
    ///
    /// Returns the drop statements; they are executed only when `run` is set.
    pub async fn cleanup(&mut self, run: bool) -> Result<Vec<String>> {
        let triggers = introspect::leftover_triggers(&mut self.exec).await?;
        let tables = introspect::leftover_tables(&mut self.exec).await?;

        let mut statements = Vec::with_capacity(triggers.len() + tables.len());
        for trigger in &triggers {
            statements.push(format!("drop trigger if exists {}", quote_mysql(trigger)?));
        }
        for table in &tables {
            statements.push(format!("drop table if exists {}", quote_mysql(table)?));
        }

        if statements.is_empty() {
            info!("Nothing to clean up");
        } else if run {
            self.exec.execute_all(&statements).await?;
            info!(
                "Dropped {} trigger(s) and {} table(s)",
                triggers.len(),
                tables.len()
            );
        } else {
            info!(
                "Found {} leftover trigger(s) and {} table(s); rerun with --run to drop them",
                triggers.len(),
                tables.len()
            );
        }
        Ok(statements)
    }
}
