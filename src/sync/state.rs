//! Synchronizer state and the table operations that run under its lock.
//!
//! Every method here is called with the synchronizer's state mutex held and
//! takes the table's advisory lock for the duration of its scan. Events are
//! collected into an [`Outbox`] and delivered by the caller once the state
//! mutex has been dropped.

use super::listener::WaitBridge;
use crate::error::Result;
use crate::events::{EventAction, LockEvent, LockListener};
use crate::id::LockId;
use crate::table::{LockRecord, STATUS_FREE, TableLock, TableScan, TableStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory knowledge about one held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Slot the record was last seen in.
    pub slot: usize,
    /// When this process first saw the lock held.
    pub seen_at: DateTime<Utc>,
    /// Lease deadline stored in the record, if any.
    pub lease: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RunState {
    Idle,
    Running,
    Stopping,
    Failed(String),
}

pub(super) struct State {
    pub(super) store: Box<dyn TableStore>,
    pub(super) index: HashMap<LockId, IndexEntry>,
    pub(super) bridges: HashMap<LockId, Arc<WaitBridge>>,
    pub(super) subscribers: Vec<Arc<dyn LockListener>>,
    /// Completed reconciliation passes.
    pub(super) passes: u64,
    /// Callers currently blocked in `watch`.
    pub(super) watchers: usize,
    pub(super) run: RunState,
}

/// Events and woken bridges waiting to be delivered.
#[derive(Default)]
pub(super) struct Outbox {
    events: Vec<LockEvent>,
    fired: Vec<Arc<WaitBridge>>,
    subscribers: Vec<Arc<dyn LockListener>>,
}

impl Outbox {
    pub(super) fn is_empty(&self) -> bool {
        self.events.is_empty() && self.fired.is_empty()
    }

    /// Wake bridges, then hand every event to every subscriber.
    pub(super) fn deliver(self) {
        for bridge in &self.fired {
            bridge.release();
        }
        for event in &self.events {
            for subscriber in &self.subscribers {
                subscriber.on_event(event);
            }
        }
    }
}

impl State {
    pub(super) fn new(store: Box<dyn TableStore>) -> Self {
        Self {
            store,
            index: HashMap::new(),
            bridges: HashMap::new(),
            subscribers: Vec::new(),
            passes: 0,
            watchers: 0,
            run: RunState::Idle,
        }
    }

    fn emit(&mut self, outbox: &mut Outbox, event: LockEvent) {
        if event.action.releases()
            && let Some(bridge) = self.bridges.remove(&event.id)
        {
            outbox.fired.push(bridge);
        }
        outbox.events.push(event);
    }

    fn seal(&self, mut outbox: Outbox) -> Outbox {
        if !outbox.events.is_empty() {
            outbox.subscribers = self.subscribers.clone();
        }
        outbox
    }

    /// Nothing held, nobody waiting, nobody subscribed.
    pub(super) fn is_idle(&self) -> bool {
        self.index.is_empty()
            && self.watchers == 0
            && self.bridges.is_empty()
            && self.subscribers.is_empty()
    }

    pub(super) fn take_bridges(&mut self) -> Vec<Arc<WaitBridge>> {
        self.bridges.drain().map(|(_, bridge)| bridge).collect()
    }

    /// One reconciliation pass.
    ///
    /// Returns `Ok(None)` without touching anything when another participant
    /// holds the table lock; the pass is simply retried on the next tick.
    pub(super) fn reconcile(&mut self, now: DateTime<Utc>) -> Result<Option<Outbox>> {
        let mut expired = Vec::new();
        let (records, scan) = {
            let Some(mut table) = TableLock::try_acquire(self.store.as_mut())? else {
                return Ok(None);
            };
            let mut records = table.records()?;
            let scan = TableScan::new(&records, now);
            for &slot in &scan.expired {
                table.free_slot(slot)?;
                expired.push((slot, records[slot].id));
                records[slot].status = STATUS_FREE;
            }
            if !records.is_empty() && scan.all_free() {
                table.truncate()?;
                tracing::debug!(slots = records.len(), "every slot free; truncated lock table");
            }
            table.release()?;
            (records, scan)
        };

        let mut outbox = Outbox::default();

        for (slot, id) in expired {
            // Another slot may still hold the same identifier.
            if scan.live.contains_key(&id) {
                continue;
            }
            self.index.remove(&id);
            tracing::debug!(id = %id, slot, "lease expired; freed slot");
            self.emit(&mut outbox, LockEvent::new(EventAction::Expired, id).with_slot(slot));
        }

        let mut stale: Vec<(usize, LockId)> = self
            .index
            .iter()
            .filter(|(id, _)| !scan.live.contains_key(*id))
            .map(|(id, entry)| (entry.slot, *id))
            .collect();
        stale.sort();
        for (slot, id) in stale {
            self.index.remove(&id);
            self.emit(&mut outbox, LockEvent::new(EventAction::Deleted, id).with_slot(slot));
        }

        let mut live: Vec<(usize, LockId)> = scan.live.iter().map(|(id, slot)| (*slot, *id)).collect();
        live.sort();
        for (slot, id) in live {
            let lease = records[slot].lease_deadline();
            match self.index.get_mut(&id) {
                Some(entry) => {
                    entry.slot = slot;
                    entry.lease = lease;
                }
                None => {
                    self.index.insert(
                        id,
                        IndexEntry {
                            slot,
                            seen_at: now,
                            lease,
                        },
                    );
                    self.emit(&mut outbox, LockEvent::new(EventAction::Created, id).with_slot(slot));
                }
            }
        }

        self.passes += 1;
        Ok(Some(self.seal(outbox)))
    }

    /// Claim `id` in the table.
    ///
    /// Returns `false` without writing when a live record for `id` already
    /// exists; the first writer under the advisory lock wins.
    pub(super) fn register(
        &mut self,
        id: &LockId,
        lease: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(bool, Outbox)> {
        let (claimed, slot, lease) = {
            let mut table = TableLock::acquire(self.store.as_mut())?;
            let records = table.records()?;
            let scan = TableScan::new(&records, now);
            match scan.live_slot(id) {
                Some(slot) => {
                    table.release()?;
                    (false, slot, records[slot].lease_deadline())
                }
                None => {
                    let slot = scan.claimable_slot(&records, id, now);
                    let record = LockRecord::held(*id, lease);
                    table.write_record(slot, &record)?;
                    table.release()?;
                    (true, slot, record.lease_deadline())
                }
            }
        };

        let mut outbox = Outbox::default();
        let fresh = self
            .index
            .insert(
                *id,
                IndexEntry {
                    slot,
                    seen_at: now,
                    lease,
                },
            )
            .is_none();
        if fresh {
            self.emit(&mut outbox, LockEvent::new(EventAction::Created, *id).with_slot(slot));
        }
        Ok((claimed, self.seal(outbox)))
    }

    /// Free every held slot carrying `id`.
    ///
    /// Returns `false` when no slot was held; that is not an error.
    pub(super) fn unregister(&mut self, id: &LockId) -> Result<(bool, Outbox)> {
        let released = {
            let mut table = TableLock::acquire(self.store.as_mut())?;
            let records = table.records()?;
            let mut first = None;
            for (slot, record) in records.iter().enumerate() {
                if record.id == *id && !record.is_free() {
                    table.free_slot(slot)?;
                    first.get_or_insert(slot);
                }
            }
            table.release()?;
            first
        };

        let mut outbox = Outbox::default();
        let indexed = self.index.remove(id);
        if let Some(slot) = released.or(indexed.map(|entry| entry.slot)) {
            self.emit(&mut outbox, LockEvent::new(EventAction::Deleted, *id).with_slot(slot));
        }
        Ok((released.is_some(), self.seal(outbox)))
    }
}
