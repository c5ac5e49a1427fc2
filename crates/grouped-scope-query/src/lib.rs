//! Query builder for grouped-scope.
//!
//! `grouped-scope-query` is the **query construction layer**. It turns
//! `Model` metadata plus an `Expr` predicate tree into SQL and bound
//! parameters, and executes the result synchronously through the
//! `Connection` trait from `grouped-scope-core`.
//!
//! Relationship scopes are plain [`Select`] values: everything a caller can
//! do with a table query (filters, ordering, counting, pagination) works the
//! same on a resolved scope.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod select;

pub use builder::InsertBuilder;
pub use clause::{Limit, Offset, OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Dialect, Expr};
pub use select::{Page, Select};

/// Create a SELECT query for a model.
///
/// # Example
///
/// ```ignore
/// let reports = select!(Report)
///     .filter(Expr::col("title").eq("URGENT"))
///     .all(&conn)?;
/// ```
#[macro_export]
macro_rules! select {
    ($model:ty) => {
        $crate::Select::<$model>::new()
    };
}

/// Create an INSERT query for a model.
///
/// # Example
///
/// ```ignore
/// let id = insert!(&report).execute(&conn)?;
/// ```
#[macro_export]
macro_rules! insert {
    ($model:expr) => {
        $crate::builder::InsertBuilder::new($model)
    };
}
