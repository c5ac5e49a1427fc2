//! Core types and traits for grouped-scope.
//!
//! This crate provides the foundational abstractions shared by the query
//! builder, the SQLite driver and the relationship layer:
//!
//! - `Model` trait for struct-to-table mapping
//! - `Value` and `Row` for dynamically-typed parameters and results
//! - `Connection` trait for synchronous query execution
//! - `Error`/`Result`, including the configuration errors raised when a
//!   grouped relationship cannot be resolved

pub mod connection;
pub mod error;
pub mod identifiers;
pub mod model;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, Error, QueryError,
    QueryErrorKind, Result, TypeError,
};
pub use identifiers::{is_valid_identifier, quote_ident};
pub use model::Model;
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;
