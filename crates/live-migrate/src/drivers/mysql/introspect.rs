//! Schema introspection through `information_schema`.
//!
//! All queries go through the [`ResilientExecutor`], so they get the same
//! lock-timeout handling as the DDL they precede.

use tracing::debug;

use crate::connection::ResilientExecutor;
use crate::core::schema::{Column, Table};
use crate::core::traits::Rows;
use crate::entangler::TRIGGER_PREFIX;
use crate::error::{MigrateError, Result};

/// Prefix of shadow (new) tables.
pub const DESTINATION_PREFIX: &str = "lhmn_";

/// Prefix of archived origin tables.
pub const ARCHIVE_PREFIX: &str = "lhma_";

/// Quote a string literal, escaping quotes and backslashes.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Whether a table exists in the current database.
pub async fn table_exists(exec: &mut ResilientExecutor, table: &str) -> Result<bool> {
    let sql = format!(
        "select count(*) from information_schema.tables \
         where table_schema = database() and table_name = {}",
        quote_literal(table)
    );
    let rows = exec.execute(&sql).await?;
    Ok(first_u64(&rows)? > 0)
}

/// Build a [`Table`] from the live schema.
///
/// Requires a single-column primary key.
pub async fn load_table(exec: &mut ResilientExecutor, name: &str) -> Result<Table> {
    let mut table = Table::new(name)?;

    let sql = format!(
        "select cast(column_name as char(255)), cast(column_type as char(255)), is_nullable, column_default \
         from information_schema.columns \
         where table_schema = database() and table_name = {} \
         order by ordinal_position",
        quote_literal(name)
    );
    let rows = exec.execute(&sql).await?;
    if rows.is_empty() {
        return Err(MigrateError::SchemaExtraction(format!(
            "table {} does not exist or has no columns",
            name
        )));
    }

    for row in rows {
        let mut fields = row.into_iter();
        let column_name = fields.next().flatten().ok_or_else(|| {
            MigrateError::SchemaExtraction(format!("column without name in {}", name))
        })?;
        let data_type = fields.next().flatten().unwrap_or_default();
        let nullable = fields.next().flatten().as_deref() == Some("YES");
        let default = fields.next().flatten();

        table.columns.insert(
            column_name,
            Column {
                data_type,
                nullable,
                default,
            },
        );
    }

    let sql = format!(
        "select cast(column_name as char(255)) from information_schema.key_column_usage \
         where table_schema = database() and table_name = {} and constraint_name = 'PRIMARY' \
         order by ordinal_position",
        quote_literal(name)
    );
    let pk: Vec<String> = exec
        .execute(&sql)
        .await?
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect();

    match pk.as_slice() {
        [single] => table.primary_key = single.clone(),
        [] => {
            return Err(MigrateError::SchemaExtraction(format!(
                "table {} has no primary key",
                name
            )))
        }
        _ => {
            return Err(MigrateError::SchemaExtraction(format!(
                "table {} has a composite primary key ({}), only single-column keys are supported",
                name,
                pk.join(", ")
            )))
        }
    }

    debug!(
        "Loaded {} columns for {} (pk {})",
        table.columns.len(),
        name,
        table.primary_key
    );
    Ok(table)
}

/// Shadow and archive tables left behind by earlier runs.
pub async fn leftover_tables(exec: &mut ResilientExecutor) -> Result<Vec<String>> {
    let rows = exec
        .execute(
            "select cast(table_name as char(255)) from information_schema.tables \
             where table_schema = database() and table_name like 'lhm%' order by table_name",
        )
        .await?;
    Ok(first_column(rows)
        .into_iter()
        .filter(|t| t.starts_with(DESTINATION_PREFIX) || t.starts_with(ARCHIVE_PREFIX))
        .collect())
}

/// Mirroring triggers left behind by earlier runs.
pub async fn leftover_triggers(exec: &mut ResilientExecutor) -> Result<Vec<String>> {
    let rows = exec
        .execute(
            "select cast(trigger_name as char(255)) from information_schema.triggers \
             where trigger_schema = database() and trigger_name like 'lhmt%' order by trigger_name",
        )
        .await?;
    Ok(first_column(rows)
        .into_iter()
        .filter(|t| t.starts_with(TRIGGER_PREFIX))
        .collect())
}

fn first_column(rows: Rows) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect()
}

/// First column of the first row as an unsigned integer; NULL reads as 0.
pub(crate) fn first_u64(rows: &Rows) -> Result<u64> {
    match rows.first().and_then(|row| row.first()) {
        Some(Some(value)) => value.trim().parse().map_err(|_| {
            MigrateError::SchemaExtraction(format!("expected an integer, got {:?}", value))
        }),
        _ => Ok(0),
    }
}
