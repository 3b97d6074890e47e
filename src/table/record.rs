//! Fixed-size lock records.

use crate::error::{LockTableError, Result};
use crate::id::{ID_LEN, LockId};
use chrono::{DateTime, Utc};

/// Size of one record: identifier followed by a big-endian `u64` status.
pub const RECORD_LEN: usize = ID_LEN + 8;

/// Status of a free slot.
pub const STATUS_FREE: u64 = 0;

/// Status of a slot held without a lease.
pub const STATUS_HELD: u64 = 1;

/// One slot of the lock table.
///
/// Any status other than [`STATUS_FREE`] and [`STATUS_HELD`] is a lease
/// deadline in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRecord {
    pub id: LockId,
    pub status: u64,
}

impl LockRecord {
    /// A held record, optionally bounded by a lease deadline.
    pub fn held(id: LockId, lease: Option<DateTime<Utc>>) -> Self {
        let status = match lease {
            // Deadlines at or before the epoch would collide with FREE/HELD.
            Some(deadline) => (deadline.timestamp_millis().max(0) as u64).max(STATUS_HELD + 1),
            None => STATUS_HELD,
        };
        Self { id, status }
    }

    pub fn is_free(&self) -> bool {
        self.status == STATUS_FREE
    }

    /// Lease deadline, if this record carries one.
    pub fn lease_deadline(&self) -> Option<DateTime<Utc>> {
        if self.status <= STATUS_HELD {
            return None;
        }
        i64::try_from(self.status)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Held, but the lease deadline has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_deadline().is_some_and(|deadline| deadline <= now)
    }

    /// Held and not expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_free() && !self.is_expired(now)
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[..ID_LEN].copy_from_slice(self.id.as_bytes());
        buf[ID_LEN..].copy_from_slice(&self.status.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != RECORD_LEN {
            return Err(LockTableError::CorruptTable(format!(
                "record is {} bytes, expected {}",
                buf.len(),
                RECORD_LEN
            )));
        }
        let id = LockId::from_bytes(&buf[..ID_LEN])?;
        let mut status = [0u8; 8];
        status.copy_from_slice(&buf[ID_LEN..]);
        Ok(Self {
            id,
            status: u64::from_be_bytes(status),
        })
    }
}

/// Decode a whole table image.
///
/// A trailing partial record (a writer that died mid-append) is ignored; the
/// next append at that position overwrites it.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<LockRecord>> {
    let chunks = bytes.chunks_exact(RECORD_LEN);
    let tail = chunks.remainder().len();
    if tail != 0 {
        tracing::warn!(
            tail_bytes = tail,
            "lock table has a trailing partial record; ignoring it"
        );
    }
    chunks.map(LockRecord::decode).collect()
}

/// Byte offset of a slot.
pub fn slot_offset(slot: usize) -> u64 {
    (slot * RECORD_LEN) as u64
}
