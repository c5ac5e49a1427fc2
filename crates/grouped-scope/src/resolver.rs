//! Base scope resolution.
//!
//! Turns an (owner, reflection) pair into the base query over the target
//! table: `foreign_key = owner_key` for ungrouped relationships and
//! `foreign_key IN (member keys...)` for grouped ones. The base condition goes
//! into the query's scope slot, so whatever the caller chains afterwards
//! (filters, `or_filter`, extensions, pagination, counting) refines it and
//! never widens it.

use crate::reflection::Reflection;
use grouped_scope_core::{ConfigError, ConfigErrorKind, Error, Model, Result};
use grouped_scope_query::{Expr, Select};

/// Which predicate shape a relationship resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScopeResolver {
    /// `foreign_key = owner.key`
    #[default]
    Ungrouped,
    /// `foreign_key IN (member.key, ...)` over the owner's group
    Grouped,
}

impl ScopeResolver {
    /// Restrict `target` to the records belonging to `owner`.
    ///
    /// Grouped resolution calls the reflection's group accessor once. An empty
    /// group yields a scope that matches nothing.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(relationship = reflection.name(), owner = O::TABLE_NAME)
    )]
    pub fn resolve<O: Model, T: Model, M: Model>(
        self,
        owner: &O,
        reflection: &Reflection<O, T, M>,
        target: Select<T>,
    ) -> Result<Select<T>> {
        reflection.validate()?;
        let foreign_key = Expr::qualified(T::TABLE_NAME, reflection.foreign_key_field());

        match self {
            ScopeResolver::Ungrouped => {
                let key = owner
                    .column_value(reflection.owner_key_column())
                    .ok_or_else(|| missing_column(O::TABLE_NAME, reflection.owner_key_column()))?;
                tracing::trace!(key = ?key, "Resolved owner scope");
                Ok(target.scoped(foreign_key.eq(key)))
            }
            ScopeResolver::Grouped => {
                let group = reflection.resolve_group(owner)?;
                let keys = group.member_keys(reflection.member_key_column())?;
                if keys.is_empty() {
                    tracing::debug!("Group has no members; scope matches nothing");
                } else {
                    tracing::trace!(members = keys.len(), "Resolved group scope");
                }
                Ok(target.scoped(foreign_key.in_list(keys)))
            }
        }
    }
}

/// Resolve the base scope for `owner` through the reflection's resolver.
pub fn resolve<O: Model, T: Model, M: Model>(
    owner: &O,
    reflection: &Reflection<O, T, M>,
    target: Select<T>,
) -> Result<Select<T>> {
    reflection.resolver().resolve(owner, reflection, target)
}

fn missing_column(table: &str, column: &str) -> Error {
    Error::Config(ConfigError::new(
        ConfigErrorKind::InvalidReflection,
        format!("{table} has no column '{column}'"),
    ))
}
