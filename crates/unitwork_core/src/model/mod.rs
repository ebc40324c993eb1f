//! Entity contracts shared by every repository.
//!
//! # Responsibility
//! - Describe what a persistable entity must expose (identity, set, relations).
//! - Define the per-entity state marker recorded by the change tracker.
//!
//! # Invariants
//! - An entity identity is `(SET_NAME, key().to_string())`.
//! - A tracked identity carries exactly one `EntityState`.

pub mod entity;
pub mod state;
