//! Table and column metadata.

use std::collections::BTreeMap;

use super::identifier::validate_identifier;
use crate::error::Result;

/// Primary key column assumed when none was introspected.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column type as reported by the server (e.g. `varchar(255)`).
    pub data_type: String,

    /// Whether the column accepts NULL.
    pub nullable: bool,

    /// Column default, if any.
    pub default: Option<String>,
}

impl Column {
    /// A nullable column without default.
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            nullable: true,
            default: None,
        }
    }
}

/// Table metadata.
///
/// Columns are kept in a `BTreeMap`, so iteration order is the sorted
/// column name order regardless of how the table was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,

    /// Column definitions keyed by name.
    pub columns: BTreeMap<String, Column>,

    /// Primary key column name.
    pub primary_key: String,
}

impl Table {
    /// Create an empty table descriptor.
    ///
    /// The name must be a valid MySQL identifier.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self {
            name,
            columns: BTreeMap::new(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        })
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a column, builder style.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// Set the primary key column, builder style.
    pub fn with_primary_key(mut self, pk: impl Into<String>) -> Self {
        self.primary_key = pk.into();
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in sorted order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}
