//! Trigger-based write mirroring from the origin table to the shadow table.
//!
//! While rows are copied in the background, three `AFTER` triggers keep the
//! destination in step with live traffic:
//!
//! - insert and update both `replace into` the destination, so whichever of
//!   the trigger or the row copy writes last, the row converges to the same
//!   value
//! - delete uses `delete ignore`, which is a no-op for rows not copied yet
//!
//! Each trigger body runs in the transaction of the statement that fired it,
//! so an origin write and its mirrored write commit together.
//!
//! Only the shared columns are written. Columns new to the destination keep
//! their defaults; columns dropped from it are ignored.

use std::fmt;

use tracing::info;

use crate::connection::ResilientExecutor;
use crate::core::identifier::{quote_list, quote_mysql, shorten};
use crate::core::Migration;
use crate::error::Result;

/// Marker comment embedded in every mirroring statement.
pub const MIGRATION_TAG: &str = "/* large hadron migration */";

/// Prefix shared by all trigger names.
pub const TRIGGER_PREFIX: &str = "lhmt_";

/// The three mirrored operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Insert,
    Update,
    Delete,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [
        TriggerKind::Insert,
        TriggerKind::Update,
        TriggerKind::Delete,
    ];

    /// Short tag used in trigger names.
    pub fn tag(self) -> &'static str {
        match self {
            TriggerKind::Insert => "ins",
            TriggerKind::Update => "upd",
            TriggerKind::Delete => "del",
        }
    }

    /// SQL event keyword.
    pub fn event(self) -> &'static str {
        match self {
            TriggerKind::Insert => "insert",
            TriggerKind::Update => "update",
            TriggerKind::Delete => "delete",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event())
    }
}

/// Installs and removes the mirroring triggers for one migration.
///
/// Holds no state besides the migration: names and statements are derived
/// on every call, and installation state lives on the server.
pub struct Entangler<'a> {
    migration: &'a Migration,
}

impl<'a> Entangler<'a> {
    pub fn new(migration: &'a Migration) -> Self {
        Self { migration }
    }

    /// Trigger name for `kind`, at most 64 characters.
    pub fn trigger(&self, kind: TriggerKind) -> String {
        let prefix = format!("{}{}_", TRIGGER_PREFIX, kind.tag());
        shorten(&prefix, self.migration.origin.name())
    }

    /// `create trigger` statements for insert, update and delete, in order.
    pub fn entangle(&self) -> Result<Vec<String>> {
        let columns = self.migration.intersection()?;
        Ok(vec![
            self.create_replace_trigger(TriggerKind::Insert, &columns)?,
            self.create_replace_trigger(TriggerKind::Update, &columns)?,
            self.create_delete_trigger()?,
        ])
    }

    /// `drop trigger if exists` statements for all three triggers.
    pub fn untangle(&self) -> Result<Vec<String>> {
        TriggerKind::ALL
            .iter()
            .map(|kind| {
                Ok(format!(
                    "drop trigger if exists {}",
                    quote_mysql(&self.trigger(*kind))?
                ))
            })
            .collect()
    }

    /// Install the triggers.
    ///
    /// The first statement that fails (after the executor's retries) aborts
    /// and is returned unchanged. Triggers created before it are left in
    /// place; [`after`](Self::after) removes them.
    pub async fn before(&self, exec: &mut ResilientExecutor) -> Result<()> {
        let statements = self.entangle()?;
        for sql in &statements {
            exec.execute(sql).await?;
        }
        info!(
            "Entangled {} -> {}",
            self.migration.origin.name(),
            self.migration.destination.name()
        );
        Ok(())
    }

    /// Remove the triggers. Safe to call whether or not they exist.
    pub async fn after(&self, exec: &mut ResilientExecutor) -> Result<()> {
        let statements = self.untangle()?;
        exec.execute_all(&statements).await?;
        info!("Untangled {}", self.migration.origin.name());
        Ok(())
    }

    fn create_replace_trigger(&self, kind: TriggerKind, columns: &[String]) -> Result<String> {
        let new_values = columns
            .iter()
            .map(|c| Ok(format!("`NEW`.{}", quote_mysql(c)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "create trigger {trigger} after {event} on {origin} for each row \
             replace into {destination} ({columns}) {tag} values ({values})",
            trigger = quote_mysql(&self.trigger(kind))?,
            event = kind.event(),
            origin = quote_mysql(self.migration.origin.name())?,
            destination = quote_mysql(self.migration.destination.name())?,
            columns = quote_list(columns)?,
            tag = MIGRATION_TAG,
            values = new_values.join(", "),
        ))
    }

    fn create_delete_trigger(&self) -> Result<String> {
        let destination = quote_mysql(self.migration.destination.name())?;
        let pk = quote_mysql(&self.migration.origin.primary_key)?;

        Ok(format!(
            "create trigger {trigger} after delete on {origin} for each row \
             delete ignore from {destination} {tag} where {destination}.{pk} = OLD.{pk}",
            trigger = quote_mysql(&self.trigger(TriggerKind::Delete))?,
            origin = quote_mysql(self.migration.origin.name())?,
            destination = destination,
            tag = MIGRATION_TAG,
            pk = pk,
        ))
    }
}
