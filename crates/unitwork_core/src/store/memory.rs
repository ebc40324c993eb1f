//! In-process document store.

use super::{validate_set_name, ChangeOp, DocumentStore, StoredChange, StoredDocument};
use crate::db::{DbError, DbResult};
use log::debug;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

type Sets = HashMap<String, Vec<StoredDocument>>;

/// Document store kept in memory.
///
/// Clones share the same data, so a second context opened on a clone sees
/// what the first one committed. Closing one handle does not affect others.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sets: Rc<RefCell<Sets>>,
    closed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed {
            return Err(DbError::Closed);
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn ensure_set(&mut self, set: &str) -> DbResult<()> {
        self.ensure_open()?;
        validate_set_name(set)?;
        self.sets.borrow_mut().entry(set.to_string()).or_default();
        Ok(())
    }

    fn load_set(&self, set: &str) -> DbResult<Vec<StoredDocument>> {
        self.ensure_open()?;
        Ok(self.sets.borrow().get(set).cloned().unwrap_or_default())
    }

    fn load(&self, set: &str, key: &str) -> DbResult<Option<Value>> {
        self.ensure_open()?;
        Ok(self.sets.borrow().get(set).and_then(|documents| {
            documents
                .iter()
                .find(|document| document.key == key)
                .map(|document| document.body.clone())
        }))
    }

    fn apply(&mut self, changes: &[StoredChange]) -> DbResult<usize> {
        self.ensure_open()?;

        // Work on a copy so a failing change leaves the shared data untouched.
        let mut staged = self.sets.borrow().clone();
        for change in changes {
            apply_change(&mut staged, change)?;
        }
        *self.sets.borrow_mut() = staged;

        debug!(
            "event=store_apply module=store status=ok backend=memory changes={}",
            changes.len()
        );
        Ok(changes.len())
    }

    fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        Ok(())
    }
}

fn apply_change(sets: &mut Sets, change: &StoredChange) -> DbResult<()> {
    let documents = sets.entry(change.set.clone()).or_default();
    let position = documents
        .iter()
        .position(|document| document.key == change.key);

    match (&change.op, position) {
        (ChangeOp::Insert(_), Some(_)) => Err(DbError::DuplicateKey {
            set: change.set.clone(),
            key: change.key.clone(),
        }),
        (ChangeOp::Insert(body), None) => {
            documents.push(StoredDocument {
                key: change.key.clone(),
                body: body.clone(),
            });
            Ok(())
        }
        (ChangeOp::Update(body), Some(index)) => {
            documents[index].body = body.clone();
            Ok(())
        }
        (ChangeOp::Delete, Some(index)) => {
            documents.remove(index);
            Ok(())
        }
        (ChangeOp::Update(_) | ChangeOp::Delete, None) => Err(DbError::MissingRow {
            set: change.set.clone(),
            key: change.key.clone(),
        }),
    }
}
