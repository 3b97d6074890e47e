//! In-memory lock table.
//!
//! Clones share the same bytes and the same advisory lock, so several
//! synchronizers built over clones of one `MemoryTable` behave like several
//! processes sharing one table file.

use super::store::TableStore;
use crate::error::{LockTableError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Shared {
    bytes: Mutex<Vec<u8>>,
    locked: Mutex<bool>,
    unlocked: Condvar,
    failing: AtomicBool,
}

#[derive(Default)]
pub struct MemoryTable {
    shared: Arc<Shared>,
    holding: bool,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current table image.
    pub fn bytes(&self) -> Vec<u8> {
        self.shared.bytes.lock().clone()
    }

    /// Make every subsequent read and write fail, for exercising error paths.
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.shared.failing.load(Ordering::SeqCst) {
            return Err(LockTableError::io(
                std::path::Path::new("<memory>"),
                std::io::Error::other("injected failure"),
            ));
        }
        Ok(())
    }
}

impl Clone for MemoryTable {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            holding: false,
        }
    }
}

impl TableStore for MemoryTable {
    fn describe(&self) -> String {
        "<memory>".to_string()
    }

    fn lock(&mut self) -> Result<()> {
        let mut locked = self.shared.locked.lock();
        while *locked {
            self.shared.unlocked.wait(&mut locked);
        }
        *locked = true;
        self.holding = true;
        Ok(())
    }

    fn try_lock(&mut self) -> Result<bool> {
        let mut locked = self.shared.locked.lock();
        if *locked {
            return Ok(false);
        }
        *locked = true;
        self.holding = true;
        Ok(true)
    }

    fn unlock(&mut self) -> Result<()> {
        if self.holding {
            self.holding = false;
            *self.shared.locked.lock() = false;
            self.shared.unlocked.notify_one();
        }
        Ok(())
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        self.check()?;
        Ok(self.shared.bytes.lock().clone())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check()?;
        let mut bytes = self.shared.bytes.lock();
        let start = offset as usize;
        let end = start + data.len();
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.check()?;
        self.shared.bytes.lock().clear();
        Ok(())
    }
}
