//! Entity trait and relation metadata.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};

/// Record type managed by a repository.
///
/// Implementors are stored as JSON documents inside the entity set named by
/// `SET_NAME`. The key is rendered with `Display` to form the stored identity,
/// so two keys that print the same are the same identity.
pub trait Entity: Clone + Serialize + DeserializeOwned + 'static {
    /// Identity type (`i64`, `Uuid`, `String`, ...).
    type Key: Clone + Debug + Display;

    /// Collection name; lowercase identifier (`^[a-z][a-z0-9_]*$`).
    const SET_NAME: &'static str;

    /// Returns this entity's identity.
    fn key(&self) -> Self::Key;

    /// Relations that may be requested as eager-load paths.
    fn relations() -> &'static [Relation] {
        &[]
    }
}

/// One eager-loadable relation of an entity.
///
/// The related document(s) are written into the field named `name` before
/// the entity is deserialized, so the entity type should declare that field
/// with `#[serde(default)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub target_set: &'static str,
    pub kind: RelationKind,
}

/// How a relation joins to its target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// This document's `foreign_key` field holds the target key. Loads one
    /// object, or `null` when the field is null or the target is missing.
    Reference { foreign_key: &'static str },
    /// Target documents whose `foreign_key` field equals this entity's key.
    /// Loads an array in the target set's natural order.
    Collection { foreign_key: &'static str },
}

impl Relation {
    pub const fn reference(
        name: &'static str,
        target_set: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            target_set,
            kind: RelationKind::Reference { foreign_key },
        }
    }

    pub const fn collection(
        name: &'static str,
        target_set: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            target_set,
            kind: RelationKind::Collection { foreign_key },
        }
    }
}

/// Canonical stored identity string for an entity key.
pub fn identity_of<T: Entity>(key: &T::Key) -> String {
    key.to_string()
}

/// Looks up a declared relation of `T` by eager-load path.
pub fn find_relation<T: Entity>(path: &str) -> Option<&'static Relation> {
    T::relations().iter().find(|relation| relation.name == path)
}
