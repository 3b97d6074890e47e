//! Storage seam for the lock table and the RAII advisory-lock guard over it.

use super::record::{LockRecord, STATUS_FREE, decode_records, slot_offset};
use crate::error::Result;
use crate::id::ID_LEN;

/// Byte-level access to a lock table shared between participants.
///
/// `lock`/`try_lock`/`unlock` take and drop the whole-table advisory lock.
/// Callers go through [`TableLock`], which only exposes reads and writes
/// while that lock is held.
pub trait TableStore: Send {
    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    /// Block until the advisory lock is held.
    fn lock(&mut self) -> Result<()>;

    /// Take the advisory lock if it is free. `Ok(false)` means contended.
    fn try_lock(&mut self) -> Result<bool>;

    fn unlock(&mut self) -> Result<()>;

    /// Read the full table image.
    fn read_all(&mut self) -> Result<Vec<u8>>;

    /// Write `bytes` at `offset`, extending the table if needed.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()>;

    /// Drop every record.
    fn truncate(&mut self) -> Result<()>;
}

/// RAII guard for the table's advisory lock.
///
/// When dropped, the advisory lock is released. If that fails, a warning is
/// logged but no panic occurs; use [`TableLock::release`] to observe the error.
pub struct TableLock<'a> {
    store: &'a mut dyn TableStore,
    released: bool,
}

impl<'a> TableLock<'a> {
    /// Block until the advisory lock is held.
    pub fn acquire(store: &'a mut dyn TableStore) -> Result<Self> {
        store.lock()?;
        Ok(Self {
            store,
            released: false,
        })
    }

    /// Take the advisory lock only if nobody else holds it.
    pub fn try_acquire(store: &'a mut dyn TableStore) -> Result<Option<Self>> {
        if store.try_lock()? {
            Ok(Some(Self {
                store,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn records(&mut self) -> Result<Vec<LockRecord>> {
        let bytes = self.store.read_all()?;
        decode_records(&bytes)
    }

    pub fn write_record(&mut self, slot: usize, record: &LockRecord) -> Result<()> {
        self.store.write_at(slot_offset(slot), &record.encode())
    }

    /// Overwrite only the status word of a slot.
    pub fn write_status(&mut self, slot: usize, status: u64) -> Result<()> {
        self.store
            .write_at(slot_offset(slot) + ID_LEN as u64, &status.to_be_bytes())
    }

    pub fn free_slot(&mut self, slot: usize) -> Result<()> {
        self.write_status(slot, STATUS_FREE)
    }

    pub fn truncate(&mut self) -> Result<()> {
        self.store.truncate()
    }

    /// Release the advisory lock and report any failure.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.store.unlock()
    }
}

impl Drop for TableLock<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.store.unlock()
        {
            tracing::warn!(
                table = %self.store.describe(),
                error = %e,
                "failed to release lock table advisory lock"
            );
        }
    }
}
