//! Persistence context contract and the document-backed implementation.
//!
//! # Responsibility
//! - Define the operations repositories rely on: typed collections, state
//!   markers, composed reads, atomic commit and release.
//! - Track pending state markers without touching storage until commit.
//!
//! # Invariants
//! - One marker per tracked identity; writes overwrite it.
//! - `commit` is all-or-nothing; on failure markers stay as they were.
//! - `release` is idempotent and every other call after it fails with
//!   `UseAfterClose`.

mod document;
mod tracker;

pub use document::DocumentContext;
pub use tracker::ChangeTracker;

use crate::model::entity::Entity;
use crate::model::state::EntityState;
use crate::query::filter::Filter;
use crate::repo::error::RepoResult;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

/// Typed handle to one tracked collection.
pub struct EntitySet<T> {
    name: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> EntitySet<T> {
    pub fn new() -> Self {
        Self {
            name: T::SET_NAME,
            _entity: PhantomData,
        }
    }
}

impl<T> EntitySet<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Entity> Default for EntitySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EntitySet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntitySet<T> {}

impl<T> Debug for EntitySet<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntitySet").field(&self.name).finish()
    }
}

/// Change-tracking persistence context shared by repositories.
pub trait PersistenceContext: 'static {
    /// Returns the typed collection for `T`, registering it if needed.
    fn collection<T: Entity>(&mut self) -> RepoResult<EntitySet<T>>;

    /// Identity lookup. May answer from tracked entities before storage; a
    /// storage hit becomes tracked as `Unchanged`.
    fn find<T: Entity>(&mut self, key: &T::Key) -> RepoResult<Option<T>>;

    /// Reads stored entities matching `filter` with `include` relations
    /// loaded, in natural order. Results are not tracked.
    fn query<T: Entity>(
        &mut self,
        filter: Option<&Filter<T>>,
        include: &[&str],
    ) -> RepoResult<Vec<T>>;

    /// Records `state` for every entity. Either every marker is written or,
    /// on error, none is.
    fn set_state<T: Entity>(&mut self, entities: &[&T], state: EntityState) -> RepoResult<()>;

    /// Current marker of an identity; `Detached` when untracked.
    fn state_of<T: Entity>(&self, key: &T::Key) -> EntityState;

    /// Number of tracked identities whose marker requires a write.
    fn pending_changes(&self) -> usize;

    /// Flushes every pending marker atomically; returns affected records.
    fn commit(&mut self) -> RepoResult<usize>;

    /// Releases storage resources. Idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}
