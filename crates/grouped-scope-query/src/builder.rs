//! INSERT query builder.

use crate::expr::Dialect;
use grouped_scope_core::{Connection, Model, Result, Value};

/// INSERT query builder.
#[derive(Debug)]
pub struct InsertBuilder<'a, M: Model> {
    model: &'a M,
}

impl<'a, M: Model> InsertBuilder<'a, M> {
    /// Create a new INSERT builder for the given model instance.
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Build the INSERT SQL and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the INSERT SQL and parameters with specific dialect.
    ///
    /// Primary key columns holding NULL are left out so the database assigns
    /// them.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let (columns, values): (Vec<_>, Vec<_>) = self
            .model
            .to_row()
            .into_iter()
            .filter(|(name, value)| !(M::PRIMARY_KEY.contains(name) && value.is_null()))
            .unzip();

        let columns: Vec<_> = columns
            .iter()
            .map(|name| dialect.quote_identifier(name))
            .collect();
        let placeholders: Vec<_> = (1..=values.len())
            .map(|i| dialect.placeholder(i))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_identifier(M::TABLE_NAME),
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, values)
    }

    /// Execute the INSERT and return the inserted ID.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(table = M::TABLE_NAME))]
    pub fn execute<C: Connection + ?Sized>(self, conn: &C) -> Result<i64> {
        let (sql, params) = self.build();
        tracing::trace!(sql = %sql, params = params.len(), "INSERT");
        conn.insert(&sql, &params)
    }
}
