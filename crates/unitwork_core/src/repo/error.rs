//! Repository and unit-of-work error type.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error surfaced by repositories, contexts and units of work.
///
/// Nothing is retried internally; every variant reaches the caller as-is.
#[derive(Debug)]
pub enum RepoError {
    /// A lookup that required a match found none.
    NotFound(String),
    /// An entity cannot be attached with the requested marker.
    Tracking(String),
    /// Invalid filter/sort/include combination.
    QueryComposition(String),
    /// The unit of work or repository was used after commit or release.
    UseAfterClose,
    /// The atomic flush failed; nothing was applied.
    CommitFailure(DbError),
    /// Read-side storage failure.
    Db(DbError),
    /// A stored document no longer matches its entity type.
    InvalidData(String),
    /// The context was re-entered while already borrowed.
    ContextBusy,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::Tracking(message) => write!(f, "tracking error: {message}"),
            Self::QueryComposition(message) => write!(f, "invalid query: {message}"),
            Self::UseAfterClose => write!(f, "unit of work is closed"),
            Self::CommitFailure(err) => write!(f, "commit failed: {err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::ContextBusy => write!(f, "persistence context is already in use"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CommitFailure(err) | Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::Tracking(_)
            | Self::QueryComposition(_)
            | Self::UseAfterClose
            | Self::InvalidData(_)
            | Self::ContextBusy => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Closed => Self::UseAfterClose,
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::db::DbError;
    use std::error::Error;

    #[test]
    fn closed_store_maps_to_use_after_close() {
        let err = RepoError::from(DbError::Closed);
        assert!(matches!(err, RepoError::UseAfterClose));
    }

    #[test]
    fn commit_failure_keeps_store_error_as_source() {
        let err = RepoError::CommitFailure(DbError::MissingRow {
            set: "people".to_string(),
            key: "7".to_string(),
        });
        let source = err.source().expect("commit failure should expose source");
        assert!(source.to_string().contains("`7`"));
    }
}
