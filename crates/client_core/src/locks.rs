//! Advisory per-entity locks. They keep a user from firing a second fetch or
//! delete on an article while one is outstanding; the service stays the
//! authority on conflicting writes.

use std::{
    collections::BTreeSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use shared::domain::ArticleId;

#[derive(Debug, Default)]
pub struct EntityLocks {
    held: Mutex<BTreeSet<ArticleId>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, BTreeSet<ArticleId>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_acquire(&self, id: ArticleId) -> bool {
        self.held().insert(id)
    }

    /// Releasing an id that is not held is a no-op.
    pub fn release(&self, id: ArticleId) {
        self.held().remove(&id);
    }

    pub fn is_locked(&self, id: ArticleId) -> bool {
        self.held().contains(&id)
    }

    pub fn locked_ids(&self) -> BTreeSet<ArticleId> {
        self.held().clone()
    }

    /// Acquires `id` and returns a guard that releases it on drop, so the
    /// lock is freed on success, error, and when the owning future is dropped.
    pub fn guard(&self, id: ArticleId) -> Option<EntityLockGuard<'_>> {
        self.try_acquire(id)
            .then(|| EntityLockGuard { locks: self, id })
    }
}

#[derive(Debug)]
pub struct EntityLockGuard<'a> {
    locks: &'a EntityLocks,
    id: ArticleId,
}

impl EntityLockGuard<'_> {
    pub fn id(&self) -> ArticleId {
        self.id
    }
}

impl Drop for EntityLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(self.id);
    }
}
