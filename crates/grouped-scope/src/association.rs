//! Relationship instances.
//!
//! An [`Association`] pairs one owner record with one reflection. It resolves
//! the base scope on first use and keeps it until [`Association::reload`], so
//! repeated access neither re-queries the group nor drifts when group
//! membership changes underneath it.

use crate::reflection::Reflection;
use crate::resolver;
use grouped_scope_core::{ConfigError, ConfigErrorKind, Connection, Error, Model, Result};
use grouped_scope_query::{Page, Select};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// The has-many relationship of one owner record.
///
/// Not meant for concurrent reload: [`reload`](Self::reload) takes `&mut self`.
pub struct Association<O, T: Model, M = O> {
    owner: O,
    reflection: Arc<Reflection<O, T, M>>,
    scope: OnceLock<Select<T>>,
    loaded: OnceLock<Vec<T>>,
}

impl<O: Model, T: Model, M: Model> Association<O, T, M> {
    pub fn new(owner: O, reflection: Arc<Reflection<O, T, M>>) -> Self {
        Self {
            owner,
            reflection,
            scope: OnceLock::new(),
            loaded: OnceLock::new(),
        }
    }

    pub fn owner(&self) -> &O {
        &self.owner
    }

    pub fn reflection(&self) -> &Reflection<O, T, M> {
        &self.reflection
    }

    pub fn into_owner(self) -> O {
        self.owner
    }

    /// The memoized base scope, resolved on first call.
    pub fn scope(&self) -> Result<&Select<T>> {
        if let Some(scope) = self.scope.get() {
            return Ok(scope);
        }
        let resolved = resolver::resolve(&self.owner, &*self.reflection, Select::new())?;
        Ok(self.scope.get_or_init(|| resolved))
    }

    /// An owned copy of the base scope for further chaining.
    pub fn query(&self) -> Result<Select<T>> {
        self.scope().cloned()
    }

    /// The base scope refined by the named association extension.
    pub fn extension(&self, name: &str) -> Result<Select<T>> {
        let extension = self.reflection.extension(name).ok_or_else(|| {
            Error::Config(ConfigError::new(
                ConfigErrorKind::UnknownExtension,
                format!(
                    "relationship '{}' has no extension '{name}'",
                    self.reflection.name()
                ),
            ))
        })?;
        Ok(extension(self.query()?))
    }

    /// Load the target records, once.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(relationship = self.reflection.name(), target = T::TABLE_NAME)
    )]
    pub fn load<C: Connection + ?Sized>(&self, conn: &C) -> Result<&[T]> {
        if let Some(records) = self.loaded.get() {
            tracing::trace!("Association already loaded");
            return Ok(records.as_slice());
        }
        let scope = self.scope()?;
        let records = if scope.is_empty_scope() {
            Vec::new()
        } else {
            scope.all(conn)?
        };
        tracing::debug!(count = records.len(), "Loaded association");
        Ok(self.loaded.get_or_init(|| records).as_slice())
    }

    /// Count target records with a `COUNT(*)` query over the base scope.
    pub fn count<C: Connection + ?Sized>(&self, conn: &C) -> Result<u64> {
        let scope = self.scope()?;
        if scope.is_empty_scope() {
            return Ok(0);
        }
        scope.count(conn)
    }

    /// One page of target records plus the scope's total.
    pub fn page<C: Connection + ?Sized>(
        &self,
        conn: &C,
        page: u64,
        per_page: u64,
    ) -> Result<Page<T>> {
        self.scope()?.page(conn, page, per_page)
    }

    pub fn is_resolved(&self) -> bool {
        self.scope.get().is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Forget the memoized scope and records; the next access resolves again.
    pub fn reload(&mut self) {
        tracing::trace!(relationship = self.reflection.name(), "Reloading association");
        self.scope.take();
        self.loaded.take();
    }

    /// Reload, then load the records again.
    pub fn reloaded<C: Connection + ?Sized>(&mut self, conn: &C) -> Result<&[T]> {
        self.reload();
        self.load(conn)
    }
}

impl<O: Model + fmt::Debug, T: Model, M: Model> fmt::Debug for Association<O, T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("owner", &self.owner)
            .field("relationship", &self.reflection.name())
            .field("resolved", &self.scope.get().is_some())
            .field("loaded", &self.loaded.get().map(Vec::len))
            .finish()
    }
}
