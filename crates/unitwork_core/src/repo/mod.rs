//! Repository layer abstractions over a shared persistence context.
//!
//! # Responsibility
//! - Define the per-entity data access contract (`EntityRepository`).
//! - Provide the default implementation over any `PersistenceContext`.
//!
//! # Invariants
//! - Writes only record state markers; storage is touched on save.
//! - Reads return untracked snapshots, except `get_by_id` which attaches.
//! - A closed context fails every operation with `UseAfterClose`.

pub mod error;
pub mod handle;
pub mod repository;
