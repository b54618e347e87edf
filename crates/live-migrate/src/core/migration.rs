//! Origin/destination pairing for one migration run.

use super::schema::Table;
use crate::error::{MigrateError, Result};

/// An origin table and the shadow table that will replace it.
#[derive(Debug, Clone)]
pub struct Migration {
    pub origin: Table,
    pub destination: Table,
}

impl Migration {
    pub fn new(origin: Table, destination: Table) -> Self {
        Self {
            origin,
            destination,
        }
    }

    /// Columns present, by name, in both tables, in sorted order.
    ///
    /// The order is embedded verbatim in generated statements, so it must be
    /// the same on every call. Both column maps are sorted, which makes it so.
    pub fn shared_columns(&self) -> Vec<String> {
        self.origin
            .column_names()
            .filter(|name| self.destination.has_column(name))
            .map(str::to_string)
            .collect()
    }

    /// Like [`shared_columns`](Self::shared_columns), but an empty
    /// intersection is an error.
    pub fn intersection(&self) -> Result<Vec<String>> {
        let shared = self.shared_columns();
        if shared.is_empty() {
            return Err(MigrateError::NoSharedColumns {
                origin: self.origin.name().to_string(),
                destination: self.destination.name().to_string(),
            });
        }
        Ok(shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Column;

    fn table(name: &str, columns: &[&str]) -> Table {
        columns.iter().fold(Table::new(name).unwrap(), |t, c| {
            t.with_column(*c, Column::new("varchar(255)"))
        })
    }

    #[test]
    fn test_shared_columns_is_sorted_intersection() {
        let migration = Migration::new(
            table("origin", &["tags", "id", "legacy", "info"]),
            table("destination", &["info", "id", "tags", "created_at"]),
        );
        assert_eq!(migration.shared_columns(), vec!["id", "info", "tags"]);
    }

    #[test]
    fn test_shared_columns_is_stable_across_calls() {
        let migration = Migration::new(
            table("origin", &["b", "a", "c"]),
            table("destination", &["c", "b", "a"]),
        );
        assert_eq!(migration.shared_columns(), migration.shared_columns());
    }

    #[test]
    fn test_intersection_rejects_disjoint_tables() {
        let migration = Migration::new(table("origin", &["a"]), table("destination", &["b"]));
        let err = migration.intersection().unwrap_err();
        assert!(matches!(err, MigrateError::NoSharedColumns { .. }));
        assert!(err.to_string().contains("origin"));
        assert!(err.to_string().contains("destination"));
    }
}
