//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for document storage.
//! - Apply schema migrations in deterministic order.
//! - Define the storage error shared by every `DocumentStore`.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No document is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Storage-level failure raised by SQLite bootstrap or a document store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A document body could not be encoded or decoded as JSON.
    Serialization(serde_json::Error),
    /// Insert of an identity that already exists in the set.
    DuplicateKey { set: String, key: String },
    /// Update or delete of an identity that is not stored.
    MissingRow { set: String, key: String },
    /// Entity set name is not a lowercase identifier.
    InvalidSetName(String),
    /// The store has been closed.
    Closed,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Serialization(err) => write!(f, "invalid document body: {err}"),
            Self::DuplicateKey { set, key } => {
                write!(f, "document `{key}` already exists in set `{set}`")
            }
            Self::MissingRow { set, key } => {
                write!(f, "document `{key}` does not exist in set `{set}`")
            }
            Self::InvalidSetName(name) => write!(
                f,
                "invalid entity set name `{name}`; expected lowercase identifier"
            ),
            Self::Closed => write!(f, "document store is closed"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. }
            | Self::DuplicateKey { .. }
            | Self::MissingRow { .. }
            | Self::InvalidSetName(_)
            | Self::Closed => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
