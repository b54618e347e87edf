//! Shadow table creation.
//!
//! The shadow table starts as `create table ... like <origin>` and then gets
//! the requested changes applied. Nothing touches the origin table here.

use tracing::info;

use crate::connection::ResilientExecutor;
use crate::core::identifier::{quote_list, quote_mysql, shorten, validate_identifier};
use crate::core::Migration;
use crate::drivers::mysql::introspect::{self, DESTINATION_PREFIX};
use crate::error::{MigrateError, Result};

/// One requested schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    AddColumn { name: String, definition: String },
    ChangeColumn { name: String, definition: String },
    RemoveColumn { name: String },
    AddIndex { columns: Vec<String>, unique: bool },
    RemoveIndex { columns: Vec<String> },
    /// Raw statement; `%s` is replaced by the quoted shadow table name.
    Ddl(String),
}

/// Collects schema changes and builds the shadow table.
#[derive(Debug, Clone)]
pub struct Migrator {
    origin: String,
    destination: String,
    changes: Vec<Change>,
}

impl Migrator {
    pub fn new(origin: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        validate_identifier(&origin)?;
        let destination = shorten(DESTINATION_PREFIX, &origin);
        Ok(Self {
            origin,
            destination,
            changes: Vec::new(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Shadow table name, `lhmn_<origin>`.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn add_column(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.changes.push(Change::AddColumn {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }

    pub fn change_column(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.changes.push(Change::ChangeColumn {
            name: name.into(),
            definition: definition.into(),
        });
        self
    }

    pub fn remove_column(mut self, name: impl Into<String>) -> Self {
        self.changes.push(Change::RemoveColumn { name: name.into() });
        self
    }

    pub fn add_index<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.changes.push(Change::AddIndex {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        });
        self
    }

    pub fn add_unique_index<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.changes.push(Change::AddIndex {
            columns: columns.into_iter().map(Into::into).collect(),
            unique: true,
        });
        self
    }

    pub fn remove_index<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.changes.push(Change::RemoveIndex {
            columns: columns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn ddl(mut self, statement: impl Into<String>) -> Self {
        self.changes.push(Change::Ddl(statement.into()));
        self
    }

    /// Index name for `columns`, as it will read once the shadow table
    /// replaces the origin.
    pub fn index_name(&self, columns: &[String]) -> String {
        shorten("index_", &format!("{}_on_{}", self.origin, columns.join("_and_")))
    }

    /// The statements that create and alter the shadow table, in order.
    pub fn statements(&self) -> Result<Vec<String>> {
        let origin = quote_mysql(&self.origin)?;
        let dest = quote_mysql(&self.destination)?;

        let mut statements = vec![format!("create table {} like {}", dest, origin)];
        for change in &self.changes {
            let sql = match change {
                Change::AddColumn { name, definition } => format!(
                    "alter table {} add column {} {}",
                    dest,
                    quote_mysql(name)?,
                    definition
                ),
                Change::ChangeColumn { name, definition } => format!(
                    "alter table {} modify column {} {}",
                    dest,
                    quote_mysql(name)?,
                    definition
                ),
                Change::RemoveColumn { name } => {
                    format!("alter table {} drop {}", dest, quote_mysql(name)?)
                }
                Change::AddIndex { columns, unique } => {
                    if columns.is_empty() {
                        return Err(MigrateError::Config("index needs at least one column".into()));
                    }
                    format!(
                        "create {}index {} on {} ({})",
                        if *unique { "unique " } else { "" },
                        quote_mysql(&self.index_name(columns))?,
                        dest,
                        quote_list(columns)?
                    )
                }
                Change::RemoveIndex { columns } => format!(
                    "drop index {} on {}",
                    quote_mysql(&self.index_name(columns))?,
                    dest
                ),
                Change::Ddl(statement) => statement.replace("%s", &dest),
            };
            statements.push(sql);
        }
        Ok(statements)
    }

    /// Create and alter the shadow table, then describe both tables.
    ///
    /// Refuses to run when the shadow table already exists; that is a
    /// leftover of an earlier run and must be cleaned up first.
    pub async fn run(&self, exec: &mut ResilientExecutor) -> Result<Migration> {
        if !introspect::table_exists(exec, &self.origin).await? {
            return Err(MigrateError::SchemaExtraction(format!(
                "origin table {} does not exist",
                self.origin
            )));
        }
        if introspect::table_exists(exec, &self.destination).await? {
            return Err(MigrateError::Config(format!(
                "{} already exists, run cleanup before migrating {}",
                self.destination, self.origin
            )));
        }

        let statements = self.statements()?;
        exec.execute_all(&statements).await?;
        info!(
            "Created {} with {} change(s)",
            self.destination,
            self.changes.len()
        );

        let origin = introspect::load_table(exec, &self.origin).await?;
        let destination = introspect::load_table(exec, &self.destination).await?;
        Ok(Migration::new(origin, destination))
    }
}
