//! Generic repository and unit-of-work layer over a change-tracking
//! persistence context.
//!
//! Repositories record state markers; a `UnitOfWork` hands out one
//! repository per entity type and flushes every marker in one atomic commit.

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod store;
pub mod uow;

pub use context::{ChangeTracker, DocumentContext, EntitySet, PersistenceContext};
pub use db::{DbError, DbResult};
pub use logging::{
    active_config, default_log_level, flush_logs, init_logging, LogConfig, LogError,
};
pub use model::entity::{Entity, Relation, RelationKind};
pub use model::state::EntityState;
pub use query::filter::Filter;
pub use query::sort::{Sort, SortDirection, SortKey};
pub use query::{compose_query, QuerySpec};
pub use repo::error::{RepoError, RepoResult};
pub use repo::handle::ContextHandle;
pub use repo::repository::{EntityRepository, Repository};
pub use store::{DocumentStore, MemoryStore, SqliteStore};
pub use uow::UnitOfWork;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
