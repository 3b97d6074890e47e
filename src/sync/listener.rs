//! Wait-bridge: turns a "lock released" event into a blocking wait.

use crate::error::{LockTableError, Result};
use crate::events::{LockEvent, LockListener};
use parking_lot::{Condvar, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Latch {
    Pending,
    Released,
    Stopped,
    Failed(String),
}

/// Single-count latch for one watched identifier.
///
/// The synchronizer drops a bridge from its registry as soon as it fires, so
/// the next caller to watch the same identifier gets a fresh one.
#[derive(Debug)]
pub struct WaitBridge {
    latch: Mutex<Latch>,
    signal: Condvar,
}

impl WaitBridge {
    pub(crate) fn new() -> Self {
        Self {
            latch: Mutex::new(Latch::Pending),
            signal: Condvar::new(),
        }
    }

    /// Block until the lock is released or `deadline` passes.
    ///
    /// Returns `Ok(true)` on release, `Ok(false)` on timeout, and an error if
    /// the synchronizer stopped or failed while we were waiting.
    pub fn wait(&self, deadline: Option<Instant>) -> Result<bool> {
        let mut latch = self.latch.lock();
        while *latch == Latch::Pending {
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(&mut latch, deadline).timed_out() {
                        break;
                    }
                }
                None => self.signal.wait(&mut latch),
            }
        }
        match &*latch {
            Latch::Pending => Ok(false),
            Latch::Released => Ok(true),
            Latch::Stopped => Err(LockTableError::Aborted(
                "synchronizer stopped while waiting for release".to_string(),
            )),
            Latch::Failed(reason) => Err(LockTableError::ServiceFailed(reason.clone())),
        }
    }

    pub fn is_pending(&self) -> bool {
        *self.latch.lock() == Latch::Pending
    }

    pub(crate) fn release(&self) {
        self.settle(Latch::Released);
    }

    pub(crate) fn stop(&self) {
        self.settle(Latch::Stopped);
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.settle(Latch::Failed(reason.to_string()));
    }

    fn settle(&self, outcome: Latch) {
        let mut latch = self.latch.lock();
        if *latch == Latch::Pending {
            *latch = outcome;
            self.signal.notify_all();
        }
    }
}

impl LockListener for WaitBridge {
    fn on_event(&self, event: &LockEvent) {
        if event.action.releases() {
            self.release();
        }
    }
}
