//! Per-scan view of the table: which slots are free, which identifiers are live.
//!
//! Derived from a single read of the records, so every slot number in a scan
//! refers to the same table image.

use super::record::LockRecord;
use crate::id::LockId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TableScan {
    /// Free slots in ascending order. Expired records are not included.
    pub free: Vec<usize>,
    /// First live slot of every held identifier.
    pub live: HashMap<LockId, usize>,
    /// Slots whose lease has passed but whose status has not been cleared.
    pub expired: Vec<usize>,
    /// Number of whole records in the table.
    pub slots: usize,
}

impl TableScan {
    pub fn new(records: &[LockRecord], now: DateTime<Utc>) -> Self {
        let mut scan = TableScan {
            slots: records.len(),
            ..Default::default()
        };
        for (slot, record) in records.iter().enumerate() {
            if record.is_free() {
                scan.free.push(slot);
            } else if record.is_expired(now) {
                scan.expired.push(slot);
            } else {
                scan.live.entry(record.id).or_insert(slot);
            }
        }
        scan
    }

    pub fn live_slot(&self, id: &LockId) -> Option<usize> {
        self.live.get(id).copied()
    }

    /// Slot a new registration of `id` should write to.
    ///
    /// Preference order: a slot already carrying `id` that is free or expired,
    /// then the lowest free slot, then a new slot at the end of the table.
    pub fn claimable_slot(&self, records: &[LockRecord], id: &LockId, now: DateTime<Utc>) -> usize {
        records
            .iter()
            .position(|r| r.id == *id && !r.is_live(now))
            .or_else(|| self.free.first().copied())
            .unwrap_or(self.slots)
    }

    /// True when no slot holds a live lock.
    pub fn all_free(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ID_LEN;
    use crate::table::record::{STATUS_FREE, STATUS_HELD};
    use chrono::Duration;

    fn id(fill: u8) -> LockId {
        LockId::from_bytes(&[fill; ID_LEN]).unwrap()
    }

    fn record(fill: u8, status: u64) -> LockRecord {
        LockRecord {
            id: id(fill),
            status,
        }
    }

    #[test]
    fn classifies_slots() {
        let now = Utc::now();
        let expired = LockRecord::held(id(b'c'), Some(now - Duration::seconds(1)));
        let records = vec![
            record(b'a', STATUS_HELD),
            record(b'b', STATUS_FREE),
            expired,
            record(b'a', STATUS_HELD),
        ];
        let scan = TableScan::new(&records, now);
        assert_eq!(scan.slots, 4);
        assert_eq!(scan.free, vec![1]);
        assert_eq!(scan.expired, vec![2]);
        assert_eq!(scan.live_slot(&id(b'a')), Some(0));
        assert!(scan.live_slot(&id(b'c')).is_none());
        assert!(!scan.all_free());
    }

    #[test]
    fn claim_prefers_exact_match_then_free_then_append() {
        let now = Utc::now();
        let records = vec![
            record(b'a', STATUS_HELD),
            record(b'b', STATUS_FREE),
            record(b'c', STATUS_FREE),
        ];
        let scan = TableScan::new(&records, now);

        assert_eq!(scan.claimable_slot(&records, &id(b'c'), now), 2);
        assert_eq!(scan.claimable_slot(&records, &id(b'z'), now), 1);

        let full = vec![record(b'a', STATUS_HELD)];
        let scan = TableScan::new(&full, now);
        assert_eq!(scan.claimable_slot(&full, &id(b'z'), now), 1);
    }

    #[test]
    fn expired_exact_match_is_reused_in_place() {
        let now = Utc::now();
        let records = vec![
            record(b'b', STATUS_FREE),
            LockRecord::held(id(b'a'), Some(now - Duration::seconds(5))),
        ];
        let scan = TableScan::new(&records, now);
        assert_eq!(scan.claimable_slot(&records, &id(b'a'), now), 1);
    }

    #[test]
    fn empty_table_is_all_free() {
        let scan = TableScan::new(&[], Utc::now());
        assert!(scan.all_free());
        assert_eq!(scan.slots, 0);
    }
}
