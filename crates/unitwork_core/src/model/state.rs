//! Entity state markers.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Pending lifecycle action for one tracked identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Tracked and identical to storage.
    Unchanged,
    /// Will be inserted on commit.
    Added,
    /// Will be updated on commit.
    Modified,
    /// Will be removed on commit.
    Deleted,
    /// Not tracked by the context.
    Detached,
}

impl EntityState {
    /// Stable lowercase name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Detached => "detached",
        }
    }

    /// Whether commit has to write something for this marker.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Added | Self::Modified | Self::Deleted)
    }

    /// Resolves the marker stored after requesting `requested` on an
    /// identity currently in `self`.
    ///
    /// - `Added` then `Modified` stays `Added` (the row does not exist yet).
    /// - `Added` then `Deleted` detaches. Contexts store `Deleted` instead
    ///   when storage already holds the row (see `ChangeTracker::replace`).
    /// - Any other request overwrites the current marker.
    pub fn transition(self, requested: EntityState) -> EntityState {
        match (self, requested) {
            (Self::Added, Self::Modified) => Self::Added,
            (Self::Added, Self::Deleted) => Self::Detached,
            (_, requested) => requested,
        }
    }
}

impl Display for EntityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
