//! The synchronizer: keeps an in-memory index consistent with the lock table.
//!
//! A [`Synchronizer`] owns one background thread that runs a reconciliation
//! pass every `poll_interval`:
//!
//! 1. Try the table's advisory lock (skip the pass if someone else holds it).
//! 2. Read every record. Free the slots whose lease has run out.
//! 3. Insert newly held identifiers into the index (`created` events) and
//!    drop index entries that are no longer held (`deleted` events).
//! 4. Truncate the table if every slot is free.
//! 5. Release the advisory lock, wake everyone blocked in [`Synchronizer::watch`],
//!    deliver events.
//!
//! In-process callers coordinate through a mutex/condvar monitor on the
//! synchronizer's state; other processes coordinate through the advisory lock.
//!
//! The synchronizer is an explicit value: construct one per table in the
//! composition root and hand clones to every [`DistributedLock`]. The thread
//! starts lazily on the first watch and, with `stop_when_idle`, exits again
//! once nothing is held, watched, or subscribed.
//!
//! An I/O error inside the background pass is fatal to the loop. Instead of
//! dying silently, the synchronizer moves to [`ServiceState::Failed`], wakes
//! every waiter with [`LockTableError::ServiceFailed`], and refuses further
//! watches.
//!
//! [`DistributedLock`]: crate::locks::DistributedLock

mod listener;
mod state;


pub use listener::WaitBridge;
pub use state::IndexEntry;

use crate::config::Config;
use crate::error::{LockTableError, Result};
use crate::events::LockListener;
use crate::id::LockId;
use crate::locks::DistributedLock;
use crate::table::{FileTable, TableStore};
use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard};
use state::{Outbox, RunState, State};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Tuning for a synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Pause between reconciliation passes.
    pub poll_interval: Duration,
    /// Let the background thread exit when nothing is held or awaited.
    pub stop_when_idle: bool,
    /// Lease applied by lock handles that do not set their own.
    pub default_lease: Option<Duration>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            stop_when_idle: true,
            default_lease: None,
        }
    }
}

/// Observable health of a synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// No background thread; the next watch starts one.
    Idle,
    Running,
    /// The background pass hit an I/O error and stopped for good.
    Failed { reason: String },
}

struct Shared {
    state: Mutex<State>,
    pass_done: Condvar,
    options: SyncOptions,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a lock table's synchronizer. Clones share the same instance.
#[derive(Clone)]
pub struct Synchronizer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("options", &self.shared.options)
            .field("state", &self.state())
            .finish()
    }
}

impl Synchronizer {
    pub fn new(store: impl TableStore + 'static, options: SyncOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new(Box::new(store))),
                pass_done: Condvar::new(),
                options,
                worker: Mutex::new(None),
            }),
        }
    }

    /// Open the table file named by `config` and build a synchronizer over it.
    pub fn open(config: &Config) -> Result<Self> {
        let table = FileTable::open(&config.table_path)?.with_sync_writes(config.sync_writes);
        Ok(Self::new(table, config.sync_options()))
    }

    pub fn options(&self) -> &SyncOptions {
        &self.shared.options
    }

    pub fn state(&self) -> ServiceState {
        match &self.shared.state.lock().run {
            RunState::Idle => ServiceState::Idle,
            RunState::Running | RunState::Stopping => ServiceState::Running,
            RunState::Failed(reason) => ServiceState::Failed {
                reason: reason.clone(),
            },
        }
    }

    /// Block until the next reconciliation pass completes, then report
    /// whether `id` is held.
    pub fn watch(&self, id: &LockId) -> Result<bool> {
        match self.watch_until(id, None)? {
            Some(held) => Ok(held),
            None => unreachable!("unbounded watch cannot time out"),
        }
    }

    /// Like [`watch`](Self::watch), but gives up at `deadline` and returns
    /// `Ok(None)` if no pass completed by then.
    pub fn watch_until(&self, id: &LockId, deadline: Option<Instant>) -> Result<Option<bool>> {
        let mut state = self.shared.state.lock();
        self.ensure_running(&mut state)?;
        state.watchers += 1;
        let start = state.passes;

        let outcome = loop {
            if state.passes > start {
                break Ok(Some(state.index.contains_key(id)));
            }
            match &state.run {
                RunState::Running => {}
                RunState::Failed(reason) => {
                    break Err(LockTableError::ServiceFailed(reason.clone()));
                }
                RunState::Idle | RunState::Stopping => {
                    break Err(LockTableError::Aborted(
                        "synchronizer stopped before the next pass".to_string(),
                    ));
                }
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break Ok(None);
                    }
                    self.shared.pass_done.wait_until(&mut state, deadline);
                }
                None => self.shared.pass_done.wait(&mut state),
            }
        };

        state.watchers -= 1;
        outcome
    }

    /// Whether `id` is in the index right now, without waiting for a pass.
    pub fn is_held(&self, id: &LockId) -> bool {
        self.shared.state.lock().index.contains_key(id)
    }

    /// Claim `id` in the table.
    ///
    /// Writes the record into a reused or appended slot and emits a `created`
    /// event. Returns `Ok(false)` without writing if `id` is already held.
    pub fn register(&self, id: &LockId, lease: Option<Duration>) -> Result<bool> {
        let now = Utc::now();
        let deadline = lease
            .map(|lease| {
                chrono::Duration::from_std(lease)
                    .ok()
                    .and_then(|lease| now.checked_add_signed(lease))
                    .ok_or_else(|| {
                        LockTableError::UserError(format!(
                            "lease of {}ms is out of range",
                            lease.as_millis()
                        ))
                    })
            })
            .transpose()?;

        let (claimed, outbox) = self.shared.state.lock().register(id, deadline, now)?;
        if claimed {
            tracing::debug!(id = %id, lease_ms = lease.map(millis), "registered lock");
        }
        outbox.deliver();
        Ok(claimed)
    }

    /// Release `id` in the table and wake everyone waiting on it.
    ///
    /// Releasing an identifier that is not held is a no-op returning `Ok(false)`.
    pub fn unregister(&self, id: &LockId) -> Result<bool> {
        let (released, outbox) = self.shared.state.lock().unregister(id)?;
        if released {
            tracing::debug!(id = %id, "unregistered lock");
        }
        outbox.deliver();
        Ok(released)
    }

    /// Get the wait-bridge for `id`, creating it if nobody is waiting yet.
    pub fn listen(&self, id: &LockId) -> Result<Arc<WaitBridge>> {
        let mut state = self.shared.state.lock();
        self.ensure_running(&mut state)?;
        let bridge = state
            .bridges
            .entry(*id)
            .or_insert_with(|| Arc::new(WaitBridge::new()));
        Ok(Arc::clone(bridge))
    }

    /// Give back a bridge obtained from [`listen`](Self::listen).
    ///
    /// The bridge is dropped from the registry once no other caller holds it.
    pub fn unlisten(&self, id: &LockId, bridge: Arc<WaitBridge>) {
        let mut state = self.shared.state.lock();
        drop(bridge);
        if state
            .bridges
            .get(id)
            .is_some_and(|registered| Arc::strong_count(registered) == 1)
        {
            state.bridges.remove(id);
        }
    }

    /// Deliver every future event to `listener`.
    pub fn subscribe(&self, listener: Arc<dyn LockListener>) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.ensure_running(&mut state)?;
        state.subscribers.push(listener);
        Ok(())
    }

    /// Stop delivering events to `listener`.
    pub fn unsubscribe(&self, listener: &Arc<dyn LockListener>) {
        self.shared
            .state
            .lock()
            .subscribers
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Snapshot of the index, ordered by slot.
    pub fn held(&self) -> Vec<(LockId, IndexEntry)> {
        let state = self.shared.state.lock();
        let mut held: Vec<_> = state
            .index
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();
        held.sort_by_key(|(_, entry)| entry.slot);
        held
    }

    /// A handle to some currently held lock, or to a brand-new identifier
    /// when nothing is held.
    pub fn acquire(&self) -> DistributedLock {
        match self.held().first() {
            Some((id, _)) => DistributedLock::with_id(self, *id),
            None => DistributedLock::new(self),
        }
    }

    /// Stop the background thread and wait for it to exit.
    ///
    /// Callers blocked on a wait-bridge or in `watch` get
    /// [`LockTableError::Aborted`]. A later watch starts a fresh thread.
    pub fn stop(&self) {
        let (bridges, worker) = {
            let mut state = self.shared.state.lock();
            if state.run == RunState::Running {
                state.run = RunState::Stopping;
            }
            self.shared.pass_done.notify_all();
            (state.take_bridges(), self.shared.worker.lock().take())
        };
        for bridge in bridges {
            bridge.stop();
        }

        if let Some(handle) = worker
            && handle.join().is_err()
        {
            tracing::warn!("synchronizer thread panicked");
        }

        let mut state = self.shared.state.lock();
        if state.run == RunState::Stopping {
            state.run = RunState::Idle;
        }
    }

    fn ensure_running(&self, state: &mut MutexGuard<'_, State>) -> Result<()> {
        match &state.run {
            RunState::Running => return Ok(()),
            RunState::Failed(reason) => return Err(LockTableError::ServiceFailed(reason.clone())),
            RunState::Stopping => {
                return Err(LockTableError::Aborted(
                    "synchronizer is stopping".to_string(),
                ));
            }
            RunState::Idle => {}
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("locktable-sync".to_string())
            .spawn(move || run_loop(shared))
            .map_err(|e| {
                LockTableError::ServiceFailed(format!("failed to spawn synchronizer thread: {}", e))
            })?;
        state.run = RunState::Running;
        // A previous worker that went idle has already left its loop.
        *self.shared.worker.lock() = Some(handle);
        tracing::debug!(
            poll_interval_ms = millis(self.shared.options.poll_interval),
            "synchronizer started"
        );
        Ok(())
    }
}

/// Whole milliseconds for log fields, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn run_loop(shared: Arc<Shared>) {
    loop {
        let (outbox, exit) = {
            let mut state = shared.state.lock();
            if state.run != RunState::Running {
                if state.run == RunState::Stopping {
                    state.run = RunState::Idle;
                }
                shared.pass_done.notify_all();
                return;
            }

            match state.reconcile(Utc::now()) {
                Ok(Some(outbox)) => {
                    let idle = shared.options.stop_when_idle && state.is_idle();
                    if idle {
                        state.run = RunState::Idle;
                        tracing::debug!("no live locks; synchronizer going idle");
                    }
                    shared.pass_done.notify_all();
                    (outbox, idle)
                }
                Ok(None) => (Outbox::default(), false),
                Err(e) => {
                    let reason = e.to_string();
                    tracing::error!(error = %reason, "lock table reconciliation failed; synchronizer stopped");
                    state.run = RunState::Failed(reason.clone());
                    let bridges = state.take_bridges();
                    shared.pass_done.notify_all();
                    drop(state);
                    for bridge in bridges {
                        bridge.fail(&reason);
                    }
                    return;
                }
            }
        };

        if !outbox.is_empty() {
            outbox.deliver();
        }
        if exit {
            return;
        }
        thread::sleep(shared.options.poll_interval);
    }
}
