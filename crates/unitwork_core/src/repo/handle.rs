//! Shared, releasable access to one persistence context.

use crate::context::PersistenceContext;
use crate::repo::error::{RepoError, RepoResult};
use std::cell::RefCell;
use std::rc::Rc;

/// Reference-counted slot holding a context until it is released.
///
/// Every clone sees the same context; once any clone releases it, every
/// clone fails with `UseAfterClose`.
pub struct ContextHandle<C> {
    slot: Rc<RefCell<Option<C>>>,
}

impl<C: PersistenceContext> ContextHandle<C> {
    pub fn new(context: C) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Some(context))),
        }
    }

    /// Runs `op` with exclusive access to the live context.
    ///
    /// # Errors
    /// - `UseAfterClose` once the context has been released.
    /// - `ContextBusy` when called re-entrantly from inside another `with`.
    pub fn with<R>(&self, op: impl FnOnce(&mut C) -> RepoResult<R>) -> RepoResult<R> {
        let mut slot = self
            .slot
            .try_borrow_mut()
            .map_err(|_| RepoError::ContextBusy)?;
        match slot.as_mut() {
            Some(context) if !context.is_released() => op(context),
            _ => Err(RepoError::UseAfterClose),
        }
    }

    /// Releases the context. Returns `true` only for the call that actually
    /// released it.
    pub fn release(&self) -> bool {
        let Ok(mut slot) = self.slot.try_borrow_mut() else {
            return false;
        };
        match slot.take() {
            Some(mut context) => {
                context.release();
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.slot
            .try_borrow()
            .map(|slot| slot.as_ref().is_some_and(|context| !context.is_released()))
            .unwrap_or(true)
    }

    /// Whether both handles point at the same context.
    pub fn shares_context_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<C> Clone for ContextHandle<C> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}
