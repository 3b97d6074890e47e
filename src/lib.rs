//! Locktable: mutual exclusion between threads and processes through a
//! shared file of fixed-size lock records.
//!
//! The building blocks, bottom-up:
//! - [`id`]: 36-byte lock identifiers
//! - [`table`]: the record layout and the stores that hold it
//! - [`sync`]: the background synchronizer that mirrors the table in memory
//! - [`locks`]: lock handles and guards built on a synchronizer
//!
//! ```no_run
//! use locktable::config::Config;
//! use locktable::locks::{DistributedLock, Lock};
//! use locktable::sync::Synchronizer;
//!
//! # fn main() -> locktable::error::Result<()> {
//! let sync = Synchronizer::open(&Config::default())?;
//! let lock = DistributedLock::with_prefix(&sync, "deploy-")?;
//! {
//!     let _guard = lock.guard()?;
//!     // critical section
//! }
//! assert!(lock.try_lock()?);
//! lock.unlock()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod id;
pub mod locks;
pub mod sync;
pub mod table;

#[cfg(test)]
mod test_support;

pub use error::{LockTableError, Result};
pub use id::LockId;
pub use locks::{DistributedLock, Lock, LockGuard};
pub use sync::Synchronizer;
