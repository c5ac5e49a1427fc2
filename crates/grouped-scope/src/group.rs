//! Groups and the accessors that find them.
//!
//! A [`Group`] is the ordered member set a grouped relationship widens to. A
//! [`GroupAccessor`] is how a reflection turns an owner record into its group:
//! an arbitrary closure, or one of the stock lookups below.

use grouped_scope_core::{
    ConfigError, ConfigErrorKind, Connection, Error, Model, Result, Value, is_valid_identifier,
};
use grouped_scope_query::{Expr, Select};
use std::fmt;
use std::sync::Arc;

/// An ordered set of member records.
///
/// Member order is the order keys appear in the rendered `IN (...)` list.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<M> {
    id: Option<Value>,
    members: Vec<M>,
}

impl<M> Group<M> {
    /// Create a group from its identifier and members.
    pub fn new(id: Option<Value>, members: Vec<M>) -> Self {
        Self { id, members }
    }

    /// A one-member group. Used for owners that belong to no group.
    pub fn solo(member: M) -> Self {
        Self {
            id: None,
            members: vec![member],
        }
    }

    /// A group with no members.
    pub fn empty(id: Option<Value>) -> Self {
        Self {
            id,
            members: Vec::new(),
        }
    }

    /// The group identifier, if the group has one.
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn members(&self) -> &[M] {
        &self.members
    }

    pub fn into_members(self) -> Vec<M> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<M: Model> Group<M> {
    /// Member values of `column`, in member order.
    ///
    /// Members whose key is NULL (unsaved records) contribute nothing. A
    /// column the member model does not have is a configuration error.
    pub fn member_keys(&self, column: &str) -> Result<Vec<Value>> {
        let mut keys = Vec::with_capacity(self.members.len());
        for member in &self.members {
            match member.column_value(column) {
                Some(Value::Null) => {}
                Some(key) => keys.push(key),
                None => {
                    return Err(Error::Config(ConfigError::new(
                        ConfigErrorKind::InvalidReflection,
                        format!("{} has no column '{column}'", M::TABLE_NAME),
                    )));
                }
            }
        }
        Ok(keys)
    }
}

type AccessorFn<O, M> = dyn Fn(&O) -> Result<Group<M>> + Send + Sync;

/// Resolves an owner record to its group.
///
/// Accessors are cheap to clone and shared by every association built from the
/// same reflection.
pub struct GroupAccessor<O, M = O> {
    f: Arc<AccessorFn<O, M>>,
}

impl<O, M> Clone for GroupAccessor<O, M> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<O, M> fmt::Debug for GroupAccessor<O, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupAccessor").finish_non_exhaustive()
    }
}

impl<O, M> GroupAccessor<O, M> {
    /// Resolve the owner's group.
    pub fn resolve(&self, owner: &O) -> Result<Group<M>> {
        (self.f)(owner)
    }
}

impl<O: Model + 'static, M: Model + 'static> GroupAccessor<O, M> {
    /// Wrap an arbitrary lookup.
    pub fn new(f: impl Fn(&O) -> Result<Group<M>> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    /// Group-type owners: the members are the `M` rows whose `member_column`
    /// equals the owner's primary key, ordered by `M`'s primary key.
    ///
    /// An owner without a primary key value (not yet saved) has no members.
    pub fn members<C>(member_column: impl Into<String>, conn: Arc<C>) -> Self
    where
        C: Connection + ?Sized + 'static,
    {
        let member_column = member_column.into();
        Self::new(move |owner: &O| {
            check_column(&member_column)?;
            let id = owner
                .primary_key_value()
                .into_iter()
                .next()
                .unwrap_or(Value::Null);
            if id.is_null() {
                return Ok(Group::empty(None));
            }

            let members = Select::<M>::new()
                .scoped(Expr::qualified(M::TABLE_NAME, member_column.as_str()).eq(id.clone()))
                .order_by(Expr::qualified(M::TABLE_NAME, M::primary_key_column()).asc())
                .all(conn.as_ref())?;
            tracing::debug!(
                group = O::TABLE_NAME,
                members = members.len(),
                "Loaded group members"
            );
            Ok(Group::new(Some(id), members))
        })
    }
}

impl<O: Model + Clone + 'static> GroupAccessor<O, O> {
    /// Every owner is a group of one: itself.
    pub fn solo() -> Self {
        Self::new(|owner: &O| Ok(Group::solo(owner.clone())))
    }

    /// Owners sharing the owner's `group_column` value, ordered by primary key.
    ///
    /// An owner whose group column is NULL forms a group of one.
    pub fn siblings<C>(group_column: impl Into<String>, conn: Arc<C>) -> Self
    where
        C: Connection + ?Sized + 'static,
    {
        let group_column = group_column.into();
        Self::new(move |owner: &O| {
            check_column(&group_column)?;
            let group_id = owner.column_value(&group_column).ok_or_else(|| {
                Error::Config(ConfigError::new(
                    ConfigErrorKind::InvalidReflection,
                    format!("{} has no column '{group_column}'", O::TABLE_NAME),
                ))
            })?;
            if group_id.is_null() {
                tracing::trace!(owner = O::TABLE_NAME, "No group; using solo group");
                return Ok(Group::solo(owner.clone()));
            }

            let members = Select::<O>::new()
                .scoped(Expr::qualified(O::TABLE_NAME, group_column.as_str()).eq(group_id.clone()))
                .order_by(Expr::qualified(O::TABLE_NAME, O::primary_key_column()).asc())
                .all(conn.as_ref())?;
            tracing::debug!(
                owner = O::TABLE_NAME,
                members = members.len(),
                "Loaded group siblings"
            );
            Ok(Group::new(Some(group_id), members))
        })
    }
}

fn check_column(column: &str) -> Result<()> {
    if is_valid_identifier(column) {
        Ok(())
    } else {
        Err(Error::Config(ConfigError::new(
            ConfigErrorKind::InvalidReflection,
            format!("invalid group column name '{column}'"),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouped_scope_core::Row;

    #[derive(Debug, Clone, PartialEq)]
    struct Employee {
        id: Option<i64>,
        group_id: Option<i64>,
    }

    impl Model for Employee {
        const TABLE_NAME: &'static str = "employees";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![("id", self.id.into()), ("group_id", self.group_id.into())]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                group_id: row.get_named("group_id")?,
            })
        }

        fn primary_key_value(&self) -> Vec<Value> {
            vec![self.id.into()]
        }

        fn is_new(&self) -> bool {
            self.id.is_none()
        }
    }

    fn employee(id: Option<i64>) -> Employee {
        Employee { id, group_id: None }
    }

    #[test]
    fn member_keys_follow_member_order() {
        let group = Group::new(
            Some(Value::BigInt(1)),
            vec![employee(Some(11)), employee(Some(10))],
        );
        assert_eq!(
            group.member_keys("id").unwrap(),
            vec![Value::BigInt(11), Value::BigInt(10)]
        );
        assert_eq!(group.len(), 2);
        assert_eq!(group.id(), Some(&Value::BigInt(1)));
    }

    #[test]
    fn unsaved_members_contribute_no_key() {
        let group = Group::new(None, vec![employee(None), employee(Some(3))]);
        assert_eq!(group.member_keys("id").unwrap(), vec![Value::BigInt(3)]);
    }

    #[test]
    fn unknown_member_column_is_a_config_error() {
        let group = Group::solo(employee(Some(1)));
        let err = group.member_keys("email").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidReflection));
    }

    #[test]
    fn empty_group_has_no_keys() {
        let group: Group<Employee> = Group::empty(None);
        assert!(group.is_empty());
        assert!(group.member_keys("id").unwrap().is_empty());
    }

    #[test]
    fn solo_accessor_returns_owner() {
        let accessor = GroupAccessor::<Employee>::solo();
        let owner = employee(Some(7));
        let group = accessor.resolve(&owner).unwrap();
        assert_eq!(group.members(), &[owner]);
        assert_eq!(group.id(), None);
    }

    #[test]
    fn custom_accessor_is_shared_between_clones() {
        let accessor = GroupAccessor::<Employee>::new(|owner| {
            Ok(Group::new(
                owner.column_value("group_id"),
                vec![owner.clone(), employee(Some(99))],
            ))
        });
        let copy = accessor.clone();
        let group = copy.resolve(&employee(Some(1))).unwrap();
        assert_eq!(group.into_members().len(), 2);
    }
}
