//! Persistence context over a `DocumentStore`.

use super::tracker::ChangeTracker;
use super::{EntitySet, PersistenceContext};
use crate::model::entity::{identity_of, Entity};
use crate::model::state::EntityState;
use crate::query::filter::Filter;
use crate::query::include::{attach_relation, resolve_includes, strip_relations};
use crate::repo::error::{RepoError, RepoResult};
use crate::store::{DocumentStore, StoredDocument};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Change-tracking context storing entities as JSON documents.
///
/// Reads go straight to the store; writes only touch the tracker until
/// `commit` hands every pending marker to `DocumentStore::apply`.
#[derive(Debug)]
pub struct DocumentContext<S: DocumentStore> {
    store: S,
    tracker: ChangeTracker,
    released: bool,
}

impl<S: DocumentStore> DocumentContext<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tracker: ChangeTracker::new(),
            released: false,
        }
    }

    /// Number of identities currently tracked, pending or not.
    pub fn tracked_count(&self) -> usize {
        self.tracker.tracked_count()
    }

    fn ensure_open(&self) -> RepoResult<()> {
        if self.released {
            return Err(RepoError::UseAfterClose);
        }
        Ok(())
    }
}

impl<S: DocumentStore + 'static> PersistenceContext for DocumentContext<S> {
    fn collection<T: Entity>(&mut self) -> RepoResult<EntitySet<T>> {
        self.ensure_open()?;
        self.store.ensure_set(T::SET_NAME)?;
        Ok(EntitySet::new())
    }

    fn find<T: Entity>(&mut self, key: &T::Key) -> RepoResult<Option<T>> {
        self.ensure_open()?;
        let key = identity_of::<T>(key);

        if let Some((state, snapshot)) = self.tracker.tracked(T::SET_NAME, &key) {
            if state == EntityState::Deleted {
                return Ok(None);
            }
            return decode::<T>(&key, snapshot.clone()).map(Some);
        }

        let Some(mut body) = self.store.load(T::SET_NAME, &key)? else {
            return Ok(None);
        };
        strip_relations::<T>(&mut body);
        let entity = decode::<T>(&key, body.clone())?;
        self.tracker
            .mark(T::SET_NAME, &key, body, EntityState::Unchanged);
        Ok(Some(entity))
    }

    fn query<T: Entity>(
        &mut self,
        filter: Option<&Filter<T>>,
        include: &[&str],
    ) -> RepoResult<Vec<T>> {
        self.ensure_open()?;
        let relations = resolve_includes::<T>(include)?;
        let documents = self.store.load_set(T::SET_NAME)?;
        let mut targets: HashMap<&'static str, Vec<StoredDocument>> = HashMap::new();
        let mut results = Vec::new();

        for mut document in documents {
            strip_relations::<T>(&mut document.body);
            let entity = decode::<T>(&document.key, document.body.clone())?;
            if filter.is_some_and(|filter| !filter.matches(&entity)) {
                continue;
            }
            if relations.is_empty() {
                results.push(entity);
                continue;
            }

            let mut body = document.body;
            for relation in &relations {
                if !targets.contains_key(relation.target_set) {
                    let loaded = self.store.load_set(relation.target_set)?;
                    targets.insert(relation.target_set, loaded);
                }
                let related = targets
                    .get(relation.target_set)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                attach_relation(&mut body, &document.key, relation, related)?;
            }
            results.push(decode::<T>(&document.key, body)?);
        }

        debug!(
            "event=context_query module=context status=ok set={} include={} rows={}",
            T::SET_NAME,
            include.len(),
            results.len()
        );
        Ok(results)
    }

    fn set_state<T: Entity>(&mut self, entities: &[&T], state: EntityState) -> RepoResult<()> {
        self.ensure_open()?;

        let mut staged = Vec::with_capacity(entities.len());
        for entity in entities {
            let key = identity_of::<T>(&entity.key());
            if key.trim().is_empty() {
                return Err(RepoError::Tracking(format!(
                    "entity in `{}` has an empty identity",
                    T::SET_NAME
                )));
            }
            let mut snapshot = serde_json::to_value(entity).map_err(|err| {
                RepoError::Tracking(format!(
                    "cannot snapshot `{key}` in `{}`: {err}",
                    T::SET_NAME
                ))
            })?;
            strip_relations::<T>(&mut snapshot);
            // Deleting a pending insert only detaches it when storage has no row.
            let stored_row = state == EntityState::Deleted
                && self.tracker.state_of(T::SET_NAME, &key) == EntityState::Added
                && self.store.load(T::SET_NAME, &key)?.is_some();
            staged.push((key, snapshot, stored_row));
        }

        for (key, snapshot, stored_row) in staged {
            let stored = if stored_row {
                self.tracker.replace(T::SET_NAME, &key, snapshot, state)
            } else {
                self.tracker.mark(T::SET_NAME, &key, snapshot, state)
            };
            debug!(
                "event=context_mark module=context status=ok set={} key={} requested={} stored={}",
                T::SET_NAME,
                key,
                state,
                stored
            );
        }
        Ok(())
    }

    fn state_of<T: Entity>(&self, key: &T::Key) -> EntityState {
        self.tracker
            .state_of(T::SET_NAME, &identity_of::<T>(key))
    }

    fn pending_changes(&self) -> usize {
        self.tracker.pending()
    }

    fn commit(&mut self) -> RepoResult<usize> {
        self.ensure_open()?;
        let started_at = Instant::now();
        let changes = self.tracker.changes();
        if changes.is_empty() {
            return Ok(0);
        }

        match self.store.apply(&changes) {
            Ok(affected) => {
                self.tracker.accept_changes();
                info!(
                    "event=context_commit module=context status=ok affected={} duration_ms={}",
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                error!(
                    "event=context_commit module=context status=error changes={} duration_ms={} error={}",
                    changes.len(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(RepoError::CommitFailure(err))
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let discarded = self.tracker.pending();
        self.tracker.clear();
        if let Err(err) = self.store.close() {
            warn!("event=context_release module=context status=error error={err}");
            return;
        }
        debug!("event=context_release module=context status=ok discarded={discarded}");
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

fn decode<T: Entity>(key: &str, body: Value) -> RepoResult<T> {
    serde_json::from_value(body).map_err(|err| {
        RepoError::InvalidData(format!(
            "document `{key}` in `{}` does not decode: {err}",
            T::SET_NAME
        ))
    })
}
