//! Table-level lock listing and compaction.
//!
//! These work straight on a [`TableStore`] under its advisory lock and do not
//! need a running synchronizer, which makes them usable from tooling that
//! only inspects a table.

use super::types::LockInfo;
use crate::error::Result;
use crate::table::{TableLock, TableScan, TableStore};
use chrono::Utc;

/// List every slot of the table, free ones included.
pub fn list_locks(store: &mut dyn TableStore) -> Result<Vec<LockInfo>> {
    let now = Utc::now();
    let mut table = TableLock::acquire(store)?;
    let records = table.records()?;
    table.release()?;

    Ok(records
        .iter()
        .enumerate()
        .map(|(slot, record)| LockInfo::from_record(slot, record, now))
        .collect())
}

/// Truncate the table if no slot holds a live lock.
///
/// Returns the number of slots dropped, or `None` if something is still held.
pub fn compact_table(store: &mut dyn TableStore) -> Result<Option<usize>> {
    let now = Utc::now();
    let mut table = TableLock::acquire(store)?;
    let records = table.records()?;
    let scan = TableScan::new(&records, now);

    let dropped = if scan.all_free() {
        table.truncate()?;
        Some(records.len())
    } else {
        None
    };
    table.release()?;
    Ok(dropped)
}
