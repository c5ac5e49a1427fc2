//! Relationship declarations.
//!
//! A [`Reflection`] is built once per declared has-many relationship and
//! shared (behind an `Arc`) by every association created from it. It never
//! changes after construction.

use crate::group::{Group, GroupAccessor};
use crate::resolver::ScopeResolver;
use grouped_scope_core::{
    ConfigError, ConfigErrorKind, Error, Model, Result, is_valid_identifier,
};
use grouped_scope_query::Select;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A named refinement applied on top of an association's base scope.
pub type Extension<T> = Arc<dyn Fn(Select<T>) -> Select<T> + Send + Sync>;

/// Static description of one has-many relationship from `O` to `T`.
///
/// `M` is the member type of the owner's group. For owners grouped with their
/// own kind (employees sharing a `group_id`) it is `O` itself; for group-type
/// owners (a team whose members are employees) it is the member model.
///
/// # Example
///
/// ```ignore
/// let reports = Reflection::<Employee, Report>::has_many("reports", "employee_id")
///     .extend("urgent", |q| q.filter(Expr::col("title").eq("URGENT")));
/// let group_reports =
///     reports.to_grouped(GroupAccessor::siblings("group_id", Arc::clone(&conn)));
/// ```
pub struct Reflection<O, T: Model, M = O> {
    name: String,
    foreign_key: String,
    owner_key: String,
    member_key: String,
    resolver: ScopeResolver,
    group_accessor: Option<GroupAccessor<O, M>>,
    extensions: BTreeMap<String, Extension<T>>,
}

impl<O: Model, T: Model, M: Model> Reflection<O, T, M> {
    /// Declare an ungrouped has-many relationship.
    ///
    /// `foreign_key` is the column on `T` pointing back at the owner. Owner
    /// and member keys default to the first primary key column of `O` and `M`.
    pub fn has_many(name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreign_key: foreign_key.into(),
            owner_key: O::primary_key_column().to_string(),
            member_key: M::primary_key_column().to_string(),
            resolver: ScopeResolver::Ungrouped,
            group_accessor: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Column on `O` the foreign key refers to.
    pub fn owner_key(mut self, column: impl Into<String>) -> Self {
        self.owner_key = column.into();
        self
    }

    /// Column on `M` the foreign key refers to.
    pub fn member_key(mut self, column: impl Into<String>) -> Self {
        self.member_key = column.into();
        self
    }

    /// Mark the relationship as resolving against the owner's whole group.
    pub fn grouped(mut self) -> Self {
        self.resolver = ScopeResolver::Grouped;
        self
    }

    /// Register how an owner's group is found.
    pub fn group_accessor(mut self, accessor: GroupAccessor<O, M>) -> Self {
        self.group_accessor = Some(accessor);
        self
    }

    /// Mark as grouped and register the accessor in one step.
    pub fn grouped_by(self, accessor: GroupAccessor<O, M>) -> Self {
        self.grouped().group_accessor(accessor)
    }

    /// Register a named association extension.
    pub fn extend(
        mut self,
        name: impl Into<String>,
        f: impl Fn(Select<T>) -> Select<T> + Send + Sync + 'static,
    ) -> Self {
        self.extensions.insert(name.into(), Arc::new(f));
        self
    }

    /// Derive the grouped counterpart of this relationship.
    ///
    /// Foreign key, owner key and extensions carry over; the member key is
    /// re-derived from the new member type unless it was the owner's own key
    /// column name.
    pub fn to_grouped<M2: Model>(&self, accessor: GroupAccessor<O, M2>) -> Reflection<O, T, M2> {
        Reflection {
            name: self.name.clone(),
            foreign_key: self.foreign_key.clone(),
            owner_key: self.owner_key.clone(),
            member_key: if O::TABLE_NAME == M2::TABLE_NAME {
                self.owner_key.clone()
            } else {
                M2::primary_key_column().to_string()
            },
            resolver: ScopeResolver::Grouped,
            group_accessor: Some(accessor),
            extensions: self.extensions.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn foreign_key_field(&self) -> &str {
        &self.foreign_key
    }

    pub fn owner_key_column(&self) -> &str {
        &self.owner_key
    }

    pub fn member_key_column(&self) -> &str {
        &self.member_key
    }

    pub fn resolver(&self) -> ScopeResolver {
        self.resolver
    }

    pub fn is_grouped(&self) -> bool {
        self.resolver == ScopeResolver::Grouped
    }

    pub fn has_group_accessor(&self) -> bool {
        self.group_accessor.is_some()
    }

    /// Look up a registered extension.
    pub fn extension(&self, name: &str) -> Option<&Extension<T>> {
        self.extensions.get(name)
    }

    /// Names of registered extensions, sorted.
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    /// Resolve the owner's group through the registered accessor.
    pub fn resolve_group(&self, owner: &O) -> Result<Group<M>> {
        let Some(accessor) = &self.group_accessor else {
            return Err(Error::Config(ConfigError::new(
                ConfigErrorKind::MissingGroupAccessor,
                format!(
                    "relationship '{}' on {} is grouped but no group accessor is registered",
                    self.name,
                    O::TABLE_NAME
                ),
            )));
        };
        accessor.resolve(owner)
    }

    /// Check that every key column is a plain SQL identifier.
    pub fn validate(&self) -> Result<()> {
        for (role, column) in [
            ("foreign key", &self.foreign_key),
            ("owner key", &self.owner_key),
            ("member key", &self.member_key),
        ] {
            if !is_valid_identifier(column) {
                return Err(Error::Config(ConfigError::new(
                    ConfigErrorKind::InvalidReflection,
                    format!(
                        "relationship '{}' has invalid {role} column '{column}'",
                        self.name
                    ),
                )));
            }
        }
        Ok(())
    }
}

impl<O, T: Model, M> Clone for Reflection<O, T, M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            foreign_key: self.foreign_key.clone(),
            owner_key: self.owner_key.clone(),
            member_key: self.member_key.clone(),
            resolver: self.resolver,
            group_accessor: self.group_accessor.clone(),
            extensions: self.extensions.clone(),
        }
    }
}

impl<O, T: Model, M> fmt::Debug for Reflection<O, T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflection")
            .field("name", &self.name)
            .field("foreign_key", &self.foreign_key)
            .field("owner_key", &self.owner_key)
            .field("member_key", &self.member_key)
            .field("resolver", &self.resolver)
            .field("group_accessor", &self.group_accessor.is_some())
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}
