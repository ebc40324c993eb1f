//! Unit of work over one persistence context.
//!
//! # Responsibility
//! - Own the persistence context for one logical unit of work.
//! - Hand out at most one repository per entity type.
//! - Commit every pending marker in a single atomic flush.
//!
//! # Invariants
//! - The repository cache maps `TypeId::of::<T>()` to that type's own
//!   repository instance.
//! - `save_changes` is terminal: the context is released whether the flush
//!   succeeds or fails.
//! - The context is released exactly once (explicit release, commit or drop).

use crate::context::PersistenceContext;
use crate::model::entity::Entity;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::handle::ContextHandle;
use crate::repo::repository::Repository;
use log::{debug, error, info};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

/// Coordinates repositories sharing one context and commits them together.
pub struct UnitOfWork<C: PersistenceContext> {
    id: Uuid,
    context: ContextHandle<C>,
    repositories: HashMap<TypeId, Rc<dyn Any>>,
}

impl<C: PersistenceContext> UnitOfWork<C> {
    /// Takes ownership of `context` and opens the unit of work.
    pub fn new(context: C) -> Self {
        let id = Uuid::new_v4();
        info!("event=uow_open module=uow status=ok uow_id={id}");
        Self {
            id,
            context: ContextHandle::new(context),
            repositories: HashMap::new(),
        }
    }

    /// Correlation id used in log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.context.is_open()
    }

    /// Number of distinct repositories created so far.
    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    /// Pending markers across every repository of this unit of work.
    pub fn pending_changes(&self) -> RepoResult<usize> {
        self.context
            .with(|context| Ok(context.pending_changes()))
    }

    /// Returns the repository for `T`, creating and caching it on first use.
    ///
    /// # Errors
    /// - `UseAfterClose` after `save_changes` or `release`.
    pub fn get_repository<T: Entity>(&mut self) -> RepoResult<Rc<Repository<T, C>>> {
        if !self.context.is_open() {
            return Err(RepoError::UseAfterClose);
        }

        let type_id = TypeId::of::<T>();
        if let Some(cached) = self.repositories.get(&type_id) {
            return Rc::clone(cached)
                .downcast::<Repository<T, C>>()
                .map_err(|_| {
                    RepoError::Tracking(format!(
                        "repository cache entry for `{}` has an unexpected type",
                        T::SET_NAME
                    ))
                });
        }

        let repo = Rc::new(Repository::<T, C>::attach(self.context.clone())?);
        let cached: Rc<dyn Any> = repo.clone();
        self.repositories.insert(type_id, cached);
        debug!(
            "event=uow_repository module=uow status=created uow_id={} set={} repositories={}",
            self.id,
            T::SET_NAME,
            self.repositories.len()
        );
        Ok(repo)
    }

    /// Flushes every pending marker atomically, then closes the unit of work.
    ///
    /// # Errors
    /// - `CommitFailure` when the flush fails; nothing was applied.
    /// - `UseAfterClose` when already closed.
    pub fn save_changes(&mut self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self.context.with(|context| context.commit());

        match &result {
            Ok(affected) => info!(
                "event=uow_commit module=uow status=ok uow_id={} affected={} duration_ms={}",
                self.id,
                affected,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=uow_commit module=uow status=error uow_id={} duration_ms={} error={}",
                self.id,
                started_at.elapsed().as_millis(),
                err
            ),
        }

        self.close();
        result
    }

    /// Releases the context without committing. Idempotent.
    pub fn release(&mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.repositories.clear();
        if self.context.release() {
            info!("event=uow_release module=uow status=ok uow_id={}", self.id);
        }
    }
}

impl<C: PersistenceContext> Drop for UnitOfWork<C> {
    fn drop(&mut self) {
        self.close();
    }
}
