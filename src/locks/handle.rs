//! The lock handle and the capability trait collaborators program against.

use super::guard::LockGuard;
use crate::error::{LockTableError, Result};
use crate::id::LockId;
use crate::sync::{Synchronizer, WaitBridge};
use std::time::{Duration, Instant};

/// Mutual-exclusion capability.
///
/// Collaborators only see this trait; [`DistributedLock`] is the table-backed
/// implementation.
pub trait Lock {
    /// Block until the lock is held. There is no bound on the total wait.
    fn lock(&self) -> Result<()>;

    /// Make a single claim without waiting. `Ok(false)` means held elsewhere.
    fn try_lock(&self) -> Result<bool>;

    /// Wait up to `timeout` for the lock.
    ///
    /// When the timeout elapses while the lock still looks held, one final
    /// claim is made anyway. It succeeds only if the holder released in the
    /// meantime, so a caller that "timed out" can still come back with `true`.
    fn try_lock_for(&self, timeout: Duration) -> Result<bool>;

    /// Release the lock if it is held. Releasing a free lock is a no-op.
    fn unlock(&self) -> Result<()>;

    fn id(&self) -> &LockId;
}

enum Attempt {
    Acquired,
    Retry,
    TimedOut,
}

/// A lock identified by a [`LockId`] and coordinated through a [`Synchronizer`].
///
/// Handles are cheap to clone. Any two handles with the same identifier,
/// in this process or another one sharing the table, are the same lock.
#[derive(Debug, Clone)]
pub struct DistributedLock {
    id: LockId,
    sync: Synchronizer,
    lease: Option<Duration>,
}

impl DistributedLock {
    /// A handle with a freshly generated identifier.
    pub fn new(sync: &Synchronizer) -> Self {
        Self::with_id(sync, LockId::random())
    }

    /// A handle for an existing identifier.
    pub fn with_id(sync: &Synchronizer, id: LockId) -> Self {
        Self {
            id,
            sync: sync.clone(),
            lease: sync.options().default_lease,
        }
    }

    /// A handle whose generated identifier starts with `prefix`.
    pub fn with_prefix(sync: &Synchronizer, prefix: &str) -> Result<Self> {
        Ok(Self::with_id(sync, LockId::with_prefix(prefix)?))
    }

    /// Bound how long a claim stays valid if this holder never releases it.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = Some(lease);
        self
    }

    pub fn lease(&self) -> Option<Duration> {
        self.lease
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    /// Lock, returning a guard that unlocks when dropped.
    pub fn guard(&self) -> Result<LockGuard<'_>> {
        self.lock()?;
        Ok(LockGuard::new(self))
    }

    /// Like [`guard`](Self::guard), failing with [`LockTableError::LockTimeout`]
    /// if the lock is still held after `timeout`.
    pub fn guard_for(&self, timeout: Duration) -> Result<LockGuard<'_>> {
        if self.try_lock_for(timeout)? {
            Ok(LockGuard::new(self))
        } else {
            Err(LockTableError::LockTimeout(format!(
                "'{}' still held after {}ms",
                self.id,
                timeout.as_millis()
            )))
        }
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> Result<bool> {
        loop {
            let bridge = self.sync.listen(&self.id)?;
            let attempt = self.attempt(&bridge, deadline);
            self.sync.unlisten(&self.id, bridge);
            match attempt? {
                Attempt::Acquired => return Ok(true),
                Attempt::Retry => continue,
                Attempt::TimedOut => break,
            }
        }

        let acquired = self.sync.register(&self.id, self.lease)?;
        if !acquired {
            tracing::debug!(id = %self.id, "lock still held at deadline");
        }
        Ok(acquired)
    }

    fn attempt(&self, bridge: &WaitBridge, deadline: Option<Instant>) -> Result<Attempt> {
        match self.sync.watch_until(&self.id, deadline)? {
            None => Ok(Attempt::TimedOut),
            Some(false) => {
                if self.sync.register(&self.id, self.lease)? {
                    Ok(Attempt::Acquired)
                } else {
                    // Lost the race to another claimant.
                    Ok(Attempt::Retry)
                }
            }
            Some(true) => {
                if bridge.wait(deadline)? {
                    Ok(Attempt::Retry)
                } else {
                    Ok(Attempt::TimedOut)
                }
            }
        }
    }
}

impl Lock for DistributedLock {
    fn lock(&self) -> Result<()> {
        self.acquire_until(None).map(|_| ())
    }

    fn try_lock(&self) -> Result<bool> {
        self.try_lock_for(Duration::ZERO)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        // A timeout too large to represent is an unbounded wait.
        let deadline = Instant::now().checked_add(timeout);
        self.acquire_until(deadline)
    }

    fn unlock(&self) -> Result<()> {
        let held = match self.sync.watch(&self.id) {
            Ok(held) => held,
            Err(e) => {
                // The table is still the system of record; release it directly.
                tracing::warn!(id = %self.id, error = %e, "synchronizer unavailable during unlock");
                true
            }
        };
        if held {
            self.sync.unregister(&self.id)?;
        }
        Ok(())
    }

    fn id(&self) -> &LockId {
        &self.id
    }
}
