//! Document storage backends behind the persistence context.
//!
//! # Responsibility
//! - Define the storage contract used by `DocumentContext`.
//! - Keep backend details (SQLite, in-process maps) out of change tracking.
//!
//! # Invariants
//! - `load_set` returns documents in natural (insertion) order.
//! - `apply` is all-or-nothing: on error no change is visible.
//! - `close` is idempotent; every other call on a closed store fails with
//!   `DbError::Closed`.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::db::{DbError, DbResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static SET_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid set name regex"));

/// One stored entity body with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub body: Value,
}

/// Write performed for one tracked identity during commit.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    Insert(Value),
    Update(Value),
    Delete,
}

/// Pending write addressed by `(set, key)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChange {
    pub set: String,
    pub key: String,
    pub op: ChangeOp,
}

/// Storage contract for JSON documents grouped into named sets.
pub trait DocumentStore {
    /// Validates `set` and prepares the backend to read and write it.
    fn ensure_set(&mut self, set: &str) -> DbResult<()>;

    /// Loads every document of `set` in natural order.
    fn load_set(&self, set: &str) -> DbResult<Vec<StoredDocument>>;

    /// Loads one document by identity.
    fn load(&self, set: &str, key: &str) -> DbResult<Option<Value>>;

    /// Applies every change atomically and returns the affected count.
    ///
    /// # Errors
    /// - `DuplicateKey` when an insert targets an existing identity.
    /// - `MissingRow` when an update or delete targets a missing identity.
    fn apply(&mut self, changes: &[StoredChange]) -> DbResult<usize>;

    /// Releases the backend. Safe to call more than once.
    fn close(&mut self) -> DbResult<()>;
}

/// Rejects set names that are not lowercase identifiers.
pub fn validate_set_name(set: &str) -> DbResult<()> {
    if SET_NAME_RE.is_match(set) {
        Ok(())
    } else {
        Err(DbError::InvalidSetName(set.to_string()))
    }
}
