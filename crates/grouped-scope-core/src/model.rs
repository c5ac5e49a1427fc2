//! Model trait for struct-to-table mapping.
//!
//! The `Model` trait is the contract owner records, group records and target
//! records all satisfy. Relationship resolution reads keys through
//! [`Model::column_value`], so any column named in a reflection must be part of
//! [`Model::to_row`].

use crate::Result;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// impl Model for Employee {
///     const TABLE_NAME: &'static str = "employees";
///     const PRIMARY_KEY: &'static [&'static str] = &["id"];
///
///     fn to_row(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", self.id.into()), ("group_id", self.group_id.into())]
///     }
///     // ...
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field(s).
    fn primary_key_value(&self) -> Vec<Value>;

    /// Check if this is a new record (primary key is None/default).
    fn is_new(&self) -> bool;

    /// Name of the first primary key column, `"id"` when none is declared.
    fn primary_key_column() -> &'static str {
        Self::PRIMARY_KEY.first().copied().unwrap_or("id")
    }

    /// Current value of a named column, `None` if the model has no such column.
    fn column_value(&self, column: &str) -> Option<Value> {
        self.to_row()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}
