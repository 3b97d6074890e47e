//! Lock handles for locktable.
//!
//! This module implements the caller-facing side of the lock table:
//! - [`Lock`]: the capability collaborators depend on
//!   (`lock` / `try_lock` / `try_lock_for` / `unlock` / `id`)
//! - [`DistributedLock`]: the table-backed implementation
//! - [`LockGuard`]: scoped release for critical sections
//!
//! # Acquisition
//!
//! A handle first asks its [`Synchronizer`](crate::sync::Synchronizer) whether
//! the identifier is held (`watch`, which waits for the next reconciliation
//! pass). If it is free the handle registers it in the table; registration is
//! refused when someone else got there first under the table's advisory lock,
//! and the handle goes back to waiting. If it is held, the handle blocks on the
//! identifier's wait-bridge until a deletion or expiry event fires.
//!
//! There is no FIFO fairness between waiters; a newcomer can win a race
//! against a caller that has been waiting longer.
//!
//! # RAII Guards
//!
//! [`DistributedLock::guard`] returns a guard that releases the lock when
//! dropped. If releasing fails during drop, a warning is logged but the
//! program does not crash.

mod guard;
mod handle;
mod operations;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use guard::LockGuard;
pub use handle::{DistributedLock, Lock};
pub use operations::{compact_table, list_locks};
pub use types::{LockInfo, SlotState};
