//! Database connection trait.
//!
//! Relationship resolution is synchronous: when a group accessor has to hit
//! the database, the query runs to completion before resolution returns. The
//! [`Connection`] trait therefore exposes blocking calls only.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous database connection.
///
/// Implemented by drivers (see `grouped-scope-sqlite`). The trait is object
/// safe so accessors can hold an `Arc<dyn Connection>`.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the last inserted ID.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        (**self).query_one(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        (**self).insert(sql, params)
    }
}

impl<C: Connection + ?Sized> Connection for std::sync::Arc<C> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        (**self).query_one(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        (**self).insert(sql, params)
    }
}
