//! SQLite connection for grouped-scope.
//!
// FFI bindings require unsafe code
#![allow(unsafe_code)]
//!
//! Implements the [`Connection`](grouped_scope_core::Connection) trait on top
//! of the bundled libsqlite3, so association scopes can be loaded and counted
//! against a real database.
//!
//! # Example
//!
//! ```rust
//! use grouped_scope_core::{Connection, Value};
//! use grouped_scope_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_raw("CREATE TABLE reports (id INTEGER PRIMARY KEY, employee_id INTEGER)")
//!     .unwrap();
//! let id = conn
//!     .insert("INSERT INTO reports (employee_id) VALUES ($1)", &[Value::BigInt(10)])
//!     .unwrap();
//! assert_eq!(id, 1);
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Json` | TEXT |
//! | `Null`, `Default` | NULL |
//!
//! Placeholders may be written `?`, `?N` or `$N`; parameters bind in order of
//! first appearance.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// Re-export the Connection trait for convenience.
pub use grouped_scope_core::Connection;

/// Get the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Get the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
