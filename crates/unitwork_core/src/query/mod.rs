//! Query composition for repository reads.
//!
//! # Responsibility
//! - Model the ephemeral query specification (filter, sort, include paths).
//! - Provide the default composition order as a free function so alternative
//!   repository implementations can reuse it.
//!
//! # Invariants
//! - Composition order is filter, then include paths in the given order,
//!   then sort.
//! - Include paths are validated before any storage access.

pub mod filter;
pub mod include;
pub mod sort;

use crate::context::PersistenceContext;
use crate::model::entity::Entity;
use crate::repo::error::RepoResult;
use filter::Filter;
use include::resolve_includes;
use sort::{apply_sort, Sort};

/// One read request. Built per call and discarded after materialization.
#[derive(Debug)]
pub struct QuerySpec<'a, T> {
    pub filter: Option<&'a Filter<T>>,
    pub sort: Option<&'a Sort<T>>,
    pub include: &'a [&'a str],
}

impl<T> Clone for QuerySpec<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for QuerySpec<'_, T> {}

/// Runs `spec` against `context` with the default composition order.
///
/// Results are untracked snapshots of stored data.
///
/// # Errors
/// - `QueryComposition` for invalid include paths or sort keys.
/// - Context read errors unchanged.
pub fn compose_query<T, C>(context: &mut C, spec: QuerySpec<'_, T>) -> RepoResult<Vec<T>>
where
    T: Entity,
    C: PersistenceContext,
{
    resolve_includes::<T>(spec.include)?;
    let rows = context.query(spec.filter, spec.include)?;
    match spec.sort {
        Some(sort) => apply_sort(rows, sort),
        None => Ok(rows),
    }
}
