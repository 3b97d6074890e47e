//! RAII lock guard implementation.

use super::handle::{DistributedLock, Lock};
use crate::error::Result;
use crate::id::LockId;

/// RAII guard for a held [`DistributedLock`].
///
/// When dropped, the lock is automatically released.
/// If releasing fails, a warning is logged but no panic occurs.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a DistributedLock,

    /// Whether the lock has been released manually.
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub(super) fn new(lock: &'a DistributedLock) -> Self {
        Self {
            lock,
            released: false,
        }
    }

    pub fn id(&self) -> &LockId {
        self.lock.id()
    }

    /// Manually release the lock.
    ///
    /// This is useful when you want to release the lock before the guard
    /// goes out of scope, and want to handle errors explicitly.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.unlock()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.lock.unlock()
        {
            tracing::warn!(id = %self.lock.id(), error = %e, "failed to release lock");
        }
    }
}
