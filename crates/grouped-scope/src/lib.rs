//! Grouped has-many relationships.
//!
//! A has-many relationship normally scopes its target records to one owner:
//! `reports.employee_id = 10`. Declared *grouped*, the same relationship
//! scopes to every member of the owner's group instead:
//! `reports.employee_id IN (10, 11)`. Both shapes resolve to an ordinary
//! [`Select`], so filters, named scopes, association extensions, counting and
//! pagination compose with either one unchanged.
//!
//! - [`Reflection`]: the immutable declaration of one relationship
//! - [`GroupAccessor`] and [`Group`]: how an owner's group is found
//! - [`ScopeResolver`] and [`resolve`]: the base scope for an owner
//! - [`Association`]: one owner's relationship, with its scope memoized
//!
//! # Example
//!
//! ```ignore
//! use grouped_scope::prelude::*;
//!
//! let conn = Arc::new(SqliteConnection::open_memory()?);
//!
//! let reports = Reflection::<Employee, Report>::has_many("reports", "employee_id");
//! let group_reports = Arc::new(
//!     reports.to_grouped(GroupAccessor::siblings("group_id", Arc::clone(&conn))),
//! );
//!
//! let association = Association::new(employee, group_reports);
//! let total = association.count(conn.as_ref())?;
//! let urgent = association
//!     .query()?
//!     .filter(Expr::col("title").eq("URGENT"))
//!     .all(conn.as_ref())?;
//! ```
//!
//! An empty group resolves to a scope that matches nothing (`WHERE 1 = 0`),
//! never to an unrestricted one.

pub mod association;
pub mod group;
pub mod reflection;
pub mod resolver;

pub use association::Association;
pub use group::{Group, GroupAccessor};
pub use reflection::{Extension, Reflection};
pub use resolver::{ScopeResolver, resolve};

pub use grouped_scope_core::{
    ConfigError, ConfigErrorKind, Connection, Error, FromValue, Model, Result, Row, Value,
};
pub use grouped_scope_query::{Dialect, Expr, OrderBy, Page, Select, insert, select};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Association, ConfigErrorKind, Connection, Error, Expr, Group, GroupAccessor, Model,
        OrderBy, Page, Reflection, Result, Row, ScopeResolver, Select, Value, insert, resolve,
        select,
    };
}
