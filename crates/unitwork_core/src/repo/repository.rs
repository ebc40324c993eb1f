//! Generic repository contract and default implementation.

use crate::context::{EntitySet, PersistenceContext};
use crate::model::entity::{identity_of, Entity};
use crate::model::state::EntityState;
use crate::query::filter::Filter;
use crate::query::sort::Sort;
use crate::query::{compose_query, QuerySpec};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::handle::ContextHandle;
use log::{debug, error, info};
use std::time::Instant;

/// Data access contract for one entity type.
///
/// `Repository` is the default implementation; alternative implementations
/// can reuse its read path through `query::compose_query`.
pub trait EntityRepository<T: Entity> {
    /// Filter, then eager-load `include` in order, then sort.
    fn get_all(
        &self,
        filter: Option<&Filter<T>>,
        sort: Option<&Sort<T>>,
        include: &[&str],
    ) -> RepoResult<Vec<T>>;

    fn get_by_id(&self, id: &T::Key) -> RepoResult<Option<T>>;

    /// First match in natural order, or `None`.
    fn get_first_or_default(
        &self,
        filter: Option<&Filter<T>>,
        include: &[&str],
    ) -> RepoResult<Option<T>>;

    fn create(&self, entity: &T, more: &[T]) -> RepoResult<()>;

    fn update(&self, entity: &T, more: &[T]) -> RepoResult<()>;

    fn delete(&self, entity: &T, more: &[T]) -> RepoResult<()>;

    /// # Errors
    /// - `NotFound` when no entity has `id`; nothing is marked.
    fn delete_by_id(&self, id: &T::Key) -> RepoResult<()>;

    /// Marks every entity matching `filter` as deleted and returns how many
    /// were marked. The filter is evaluated once.
    fn delete_where(&self, filter: &Filter<T>) -> RepoResult<usize>;

    /// Commits the shared context, then releases it.
    fn save_changes(&self) -> RepoResult<usize>;

    fn release(&self);
}

/// Repository bound to one entity set of a shared context.
pub struct Repository<T: Entity, C: PersistenceContext> {
    context: ContextHandle<C>,
    set: EntitySet<T>,
    owns_context: bool,
}

impl<T: Entity, C: PersistenceContext> std::fmt::Debug for Repository<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("set", &self.set)
            .field("owns_context", &self.owns_context)
            .finish_non_exhaustive()
    }
}

impl<T: Entity, C: PersistenceContext> Repository<T, C> {
    /// Standalone repository that owns `context` and releases it on drop.
    pub fn new(context: C) -> RepoResult<Self> {
        Self::bind(ContextHandle::new(context), true)
    }

    /// Repository sharing a context owned elsewhere (a `UnitOfWork`).
    pub fn attach(context: ContextHandle<C>) -> RepoResult<Self> {
        Self::bind(context, false)
    }

    fn bind(context: ContextHandle<C>, owns_context: bool) -> RepoResult<Self> {
        let set = context.with(|context| context.collection::<T>())?;
        Ok(Self {
            context,
            set,
            owns_context,
        })
    }

    pub fn set_name(&self) -> &'static str {
        self.set.name()
    }

    pub fn is_open(&self) -> bool {
        self.context.is_open()
    }

    pub fn context(&self) -> &ContextHandle<C> {
        &self.context
    }

    /// Current marker of `entity`'s identity.
    pub fn state_of(&self, entity: &T) -> RepoResult<EntityState> {
        self.context
            .with(|context| Ok(context.state_of::<T>(&entity.key())))
    }

    /// Stops tracking the given entities; pending markers are dropped.
    pub fn detach(&self, entity: &T, more: &[T]) -> RepoResult<()> {
        self.mark(entity, more, EntityState::Detached)
    }

    fn mark(&self, entity: &T, more: &[T], state: EntityState) -> RepoResult<()> {
        let entities: Vec<&T> = std::iter::once(entity).chain(more.iter()).collect();
        self.context
            .with(|context| context.set_state(&entities, state))
    }
}

impl<T: Entity, C: PersistenceContext> EntityRepository<T> for Repository<T, C> {
    fn get_all(
        &self,
        filter: Option<&Filter<T>>,
        sort: Option<&Sort<T>>,
        include: &[&str],
    ) -> RepoResult<Vec<T>> {
        let spec = QuerySpec {
            filter,
            sort,
            include,
        };
        self.context
            .with(|context| compose_query(context, spec))
    }

    fn get_by_id(&self, id: &T::Key) -> RepoResult<Option<T>> {
        self.context.with(|context| context.find::<T>(id))
    }

    fn get_first_or_default(
        &self,
        filter: Option<&Filter<T>>,
        include: &[&str],
    ) -> RepoResult<Option<T>> {
        let spec = QuerySpec {
            filter,
            sort: None,
            include,
        };
        let rows = self
            .context
            .with(|context| compose_query(context, spec))?;
        Ok(rows.into_iter().next())
    }

    fn create(&self, entity: &T, more: &[T]) -> RepoResult<()> {
        self.mark(entity, more, EntityState::Added)
    }

    fn update(&self, entity: &T, more: &[T]) -> RepoResult<()> {
        self.mark(entity, more, EntityState::Modified)
    }

    fn delete(&self, entity: &T, more: &[T]) -> RepoResult<()> {
        self.mark(entity, more, EntityState::Deleted)
    }

    fn delete_by_id(&self, id: &T::Key) -> RepoResult<()> {
        self.context.with(|context| match context.find::<T>(id)? {
            Some(entity) => context.set_state(&[&entity], EntityState::Deleted),
            None => Err(RepoError::NotFound(format!(
                "`{}` in `{}`",
                identity_of::<T>(id),
                T::SET_NAME
            ))),
        })
    }

    fn delete_where(&self, filter: &Filter<T>) -> RepoResult<usize> {
        let marked = self.context.with(|context| {
            let matches = context.query::<T>(Some(filter), &[])?;
            let entities: Vec<&T> = matches.iter().collect();
            context.set_state(&entities, EntityState::Deleted)?;
            Ok(entities.len())
        })?;
        debug!(
            "event=repo_delete module=repo status=ok set={} marked={}",
            T::SET_NAME,
            marked
        );
        Ok(marked)
    }

    fn save_changes(&self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self.context.with(|context| context.commit());
        self.context.release();

        match &result {
            Ok(affected) => info!(
                "event=repo_save module=repo status=ok set={} affected={} duration_ms={}",
                T::SET_NAME,
                affected,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=repo_save module=repo status=error set={} duration_ms={} error={}",
                T::SET_NAME,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Releases the context when this repository owns it. A repository
    /// handed out by a `UnitOfWork` leaves release to the unit of work.
    fn release(&self) {
        if self.owns_context {
            self.context.release();
        }
    }
}

impl<T: Entity, C: PersistenceContext> Drop for Repository<T, C> {
    fn drop(&mut self) {
        if self.owns_context {
            self.context.release();
        }
    }
}
