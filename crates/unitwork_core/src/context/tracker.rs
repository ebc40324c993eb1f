//! In-memory state markers keyed by `(set, key)`.

use crate::model::state::EntityState;
use crate::store::{ChangeOp, StoredChange};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct TrackedEntry {
    set: String,
    key: String,
    state: EntityState,
    snapshot: Value,
}

/// Pending state markers in first-tracked order.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    entries: BTreeMap<u64, TrackedEntry>,
    index: HashMap<(String, String), u64>,
    next_seq: u64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker of an identity; `Detached` when untracked.
    pub fn state_of(&self, set: &str, key: &str) -> EntityState {
        self.entry(set, key)
            .map_or(EntityState::Detached, |entry| entry.state)
    }

    /// Tracked marker and snapshot of an identity.
    pub fn tracked(&self, set: &str, key: &str) -> Option<(EntityState, &Value)> {
        self.entry(set, key)
            .map(|entry| (entry.state, &entry.snapshot))
    }

    /// Requests `requested` for an identity and returns the marker stored.
    ///
    /// The identity keeps its original position when re-marked.
    pub fn mark(
        &mut self,
        set: &str,
        key: &str,
        snapshot: Value,
        requested: EntityState,
    ) -> EntityState {
        let next = self.state_of(set, key).transition(requested);
        self.replace(set, key, snapshot, next)
    }

    /// Stores `state` for an identity without applying transition rules.
    pub fn replace(
        &mut self,
        set: &str,
        key: &str,
        snapshot: Value,
        state: EntityState,
    ) -> EntityState {
        let id = (set.to_string(), key.to_string());
        if state == EntityState::Detached {
            if let Some(seq) = self.index.remove(&id) {
                self.entries.remove(&seq);
            }
            return state;
        }

        let seq = match self.index.get(&id) {
            Some(seq) => *seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.index.insert(id, seq);
                seq
            }
        };
        self.entries.insert(
            seq,
            TrackedEntry {
                set: set.to_string(),
                key: key.to_string(),
                state,
                snapshot,
            },
        );
        state
    }

    pub fn pending(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state.is_pending())
            .count()
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    /// Storage writes for every pending marker, in first-tracked order.
    pub fn changes(&self) -> Vec<StoredChange> {
        self.entries
            .values()
            .filter_map(|entry| {
                let op = match entry.state {
                    EntityState::Added => ChangeOp::Insert(entry.snapshot.clone()),
                    EntityState::Modified => ChangeOp::Update(entry.snapshot.clone()),
                    EntityState::Deleted => ChangeOp::Delete,
                    EntityState::Unchanged | EntityState::Detached => return None,
                };
                Some(StoredChange {
                    set: entry.set.clone(),
                    key: entry.key.clone(),
                    op,
                })
            })
            .collect()
    }

    /// Marks the flushed state as the new baseline: written entities become
    /// `Unchanged`, deleted ones are no longer tracked.
    pub fn accept_changes(&mut self) {
        let deleted: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state == EntityState::Deleted)
            .map(|(seq, _)| *seq)
            .collect();
        for seq in deleted {
            if let Some(entry) = self.entries.remove(&seq) {
                self.index.remove(&(entry.set, entry.key));
            }
        }
        for entry in self.entries.values_mut() {
            entry.state = EntityState::Unchanged;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    fn entry(&self, set: &str, key: &str) -> Option<&TrackedEntry> {
        self.index
            .get(&(set.to_string(), key.to_string()))
            .and_then(|seq| self.entries.get(seq))
    }
}
