//! Predicate restriction applied to entity reads.

use std::fmt::{Debug, Formatter};

/// Boxed predicate over an entity.
///
/// Stores evaluate it in memory against decoded entities, so any Rust
/// closure is a valid filter.
pub struct Filter<T> {
    predicate: Box<dyn Fn(&T) -> bool>,
}

impl<T> Filter<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// Filter that rejects every entity.
    pub fn none() -> Self {
        Self::new(|_| false)
    }

    pub fn matches(&self, entity: &T) -> bool {
        (self.predicate)(entity)
    }

    /// Combines two filters; both must match.
    pub fn and(self, other: Filter<T>) -> Self
    where
        T: 'static,
    {
        Self::new(move |entity| self.matches(entity) && other.matches(entity))
    }
}

impl<T> Debug for Filter<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter(..)")
    }
}
