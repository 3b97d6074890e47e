//! Tests for the locks subsystem.

use super::*;
use crate::error::LockTableError;
use crate::id::LockId;
use crate::sync::{SyncOptions, Synchronizer};
use crate::table::{FileTable, MemoryTable};
use crate::test_support::{eventually, fast_options, file_sync, temp_table};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Each worker gets its own synchronizer over the shared file, as separate
/// processes would.
fn hammer(path: &Path, id: LockId, workers: usize, rounds: usize) -> usize {
    let counter = Arc::new(AtomicUsize::new(0));
    let inside = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let sync = file_sync(path);
            let counter = Arc::clone(&counter);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                let lock = DistributedLock::with_id(&sync, id);
                for _ in 0..rounds {
                    lock.lock().unwrap();
                    assert!(
                        !inside.swap(true, Ordering::SeqCst),
                        "two holders inside the critical section"
                    );
                    // Split read and write so overlapping holders lose updates.
                    let seen = counter.load(Ordering::SeqCst);
                    thread::yield_now();
                    counter.store(seen + 1, Ordering::SeqCst);
                    inside.store(false, Ordering::SeqCst);
                    lock.unlock().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    counter.load(Ordering::SeqCst)
}

fn assert_nothing_held(path: &Path, id: &LockId) {
    let sync = file_sync(path);
    assert!(!sync.watch(id).unwrap());

    let mut table = FileTable::open(path).unwrap();
    let infos = list_locks(&mut table).unwrap();
    assert!(infos.iter().all(|info| info.state == SlotState::Free));
}

#[test]
fn lock_gives_mutual_exclusion_across_participants() {
    let (_dir, path) = temp_table();
    let id = LockId::random();

    assert_eq!(hammer(&path, id, 8, 25), 8 * 25);
    assert_nothing_held(&path, &id);
}

#[test]
#[ignore = "slow: 10k acquire/release cycles"]
fn lock_gives_mutual_exclusion_under_heavy_contention() {
    let (_dir, path) = temp_table();
    let id = LockId::random();

    assert_eq!(hammer(&path, id, 100, 100), 100 * 100);
    assert_nothing_held(&path, &id);
}

#[test]
fn threads_sharing_one_synchronizer_exclude_each_other() {
    let (_dir, path) = temp_table();
    let sync = file_sync(&path);
    let lock = DistributedLock::new(&sync);
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock = lock.clone();
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..20 {
                    let _guard = lock.guard().unwrap();
                    let seen = counter.load(Ordering::SeqCst);
                    thread::yield_now();
                    counter.store(seen + 1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 80);
    assert!(!sync.watch(lock.id()).unwrap());
}

#[test]
fn try_lock_on_free_lock_succeeds() {
    let (_dir, path) = temp_table();
    let sync = file_sync(&path);
    let lock = DistributedLock::new(&sync);

    assert!(lock.try_lock().unwrap());
    assert!(sync.watch(lock.id()).unwrap());
    lock.unlock().unwrap();
    assert!(!sync.watch(lock.id()).unwrap());
}

#[test]
fn lock_is_not_reentrant() {
    let (_dir, path) = temp_table();
    let sync = file_sync(&path);
    let lock = DistributedLock::new(&sync);

    lock.lock().unwrap();
    assert!(!lock.try_lock().unwrap());
    lock.unlock().unwrap();
}

#[test]
fn try_lock_for_gives_up_after_timeout() {
    let (_dir, path) = temp_table();
    let holder_sync = file_sync(&path);
    let waiter_sync = file_sync(&path);
    let id = LockId::random();

    let holder = DistributedLock::with_id(&holder_sync, id);
    let waiter = DistributedLock::with_id(&waiter_sync, id);
    holder.lock().unwrap();

    let timeout = Duration::from_millis(100);
    let start = Instant::now();
    assert!(!waiter.try_lock_for(timeout).unwrap());
    let elapsed = start.elapsed();
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_secs(1));

    holder.unlock().unwrap();
}

#[test]
fn waiter_proceeds_soon_after_holder_unlocks() {
    let (_dir, path) = temp_table();
    let holder_sync = file_sync(&path);
    let waiter_sync = file_sync(&path);
    let id = LockId::random();

    let holder = DistributedLock::with_id(&holder_sync, id);
    let waiter = DistributedLock::with_id(&waiter_sync, id);
    holder.lock().unwrap();
    assert!(!waiter.try_lock().unwrap());

    let hold_for = Duration::from_millis(200);
    let start = Instant::now();
    let releaser = thread::spawn(move || {
        thread::sleep(hold_for);
        holder.unlock().unwrap();
    });

    waiter.lock().unwrap();
    let elapsed = start.elapsed();
    releaser.join().unwrap();
    assert!(elapsed >= hold_for);
    assert!(elapsed < hold_for + Duration::from_secs(2));

    waiter.unlock().unwrap();
}

#[test]
fn timed_out_waiter_claims_lock_released_before_its_deadline() {
    let table = MemoryTable::new();
    let holder_sync = Synchronizer::new(table.clone(), fast_options());
    // Passes are rare enough that the waiter never sees the release event.
    let slow_sync = Synchronizer::new(
        table,
        SyncOptions {
            poll_interval: Duration::from_secs(2),
            ..fast_options()
        },
    );
    let id = LockId::random();

    let holder = DistributedLock::with_id(&holder_sync, id);
    let waiter = DistributedLock::with_id(&slow_sync, id);
    holder.lock().unwrap();

    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        holder.unlock().unwrap();
    });

    assert!(waiter.try_lock_for(Duration::from_millis(300)).unwrap());
    releaser.join().unwrap();
    assert!(!holder_sync.register(&id, None).unwrap());
}

#[test]
fn unlock_of_free_lock_is_a_noop() {
    let (_dir, path) = temp_table();
    let sync = file_sync(&path);
    let lock = DistributedLock::new(&sync);

    lock.unlock().unwrap();
    lock.unlock().unwrap();
    assert!(!sync.watch(lock.id()).unwrap());
}

#[test]
fn guard_releases_on_drop() {
    let (_dir, path) = temp_table();
    let sync = file_sync(&path);
    let other_sync = file_sync(&path);
    let lock = DistributedLock::new(&sync);
    let other = DistributedLock::with_id(&other_sync, *lock.id());

    {
        let guard = lock.guard().unwrap();
        assert_eq!(guard.id(), lock.id());
        assert!(!other.try_lock().unwrap());
    }

    assert!(other.try_lock_for(Duration::from_secs(2)).unwrap());
    other.unlock().unwrap();
}

#[test]
fn guard_release_reports_success() {
    let (_dir, path) = temp_table();
    let sync = file_sync(&path);
    let lock = DistributedLock::new(&sync);

    let guard = lock.guard().unwrap();
    guard.release().unwrap();
    assert!(lock.try_lock().unwrap());
    lock.unlock().unwrap();
}

#[test]
fn guard_for_times_out_while_held() {
    let (_dir, path) = temp_table();
    let holder_sync = file_sync(&path);
    let waiter_sync = file_sync(&path);
    let id = LockId::random();

    let holder = DistributedLock::with_id(&holder_sync, id);
    let _held = holder.guard().unwrap();

    let waiter = DistributedLock::with_id(&waiter_sync, id);
    let result = waiter.guard_for(Duration::from_millis(50));
    assert!(matches!(result, Err(LockTableError::LockTimeout(_))));
}

#[test]
fn abandoned_lease_is_taken_over() {
    let (_dir, path) = temp_table();
    let crashed_sync = file_sync(&path);
    let survivor_sync = file_sync(&path);
    let id = LockId::random();

    DistributedLock::with_id(&crashed_sync, id)
        .with_lease(Duration::from_millis(50))
        .lock()
        .unwrap();
    // The holder never unlocks.

    let survivor = DistributedLock::with_id(&survivor_sync, id);
    assert!(survivor.try_lock_for(Duration::from_secs(5)).unwrap());
    survivor.unlock().unwrap();
}

#[test]
fn default_lease_comes_from_synchronizer_options() {
    let sync = Synchronizer::new(
        MemoryTable::new(),
        SyncOptions {
            default_lease: Some(Duration::from_secs(30)),
            ..fast_options()
        },
    );
    let lock = DistributedLock::new(&sync);
    assert_eq!(lock.lease(), Some(Duration::from_secs(30)));
    assert_eq!(
        lock.with_lease(Duration::from_secs(1)).lease(),
        Some(Duration::from_secs(1))
    );
}

#[test]
fn prefixed_handles_carry_the_prefix() {
    let sync = Synchronizer::new(MemoryTable::new(), fast_options());
    let lock = DistributedLock::with_prefix(&sync, "build-").unwrap();
    assert!(lock.id().to_string().starts_with("build-"));

    let too_long = "x".repeat(37);
    assert!(matches!(
        DistributedLock::with_prefix(&sync, &too_long),
        Err(LockTableError::InvalidIdentifier(_))
    ));
}

#[test]
fn lock_surfaces_synchronizer_failure() {
    let table = MemoryTable::new();
    let holder_sync = Synchronizer::new(table.clone(), fast_options());
    let waiter_sync = Synchronizer::new(table.clone(), fast_options());
    let id = LockId::random();

    DistributedLock::with_id(&holder_sync, id).lock().unwrap();

    let waiter = DistributedLock::with_id(&waiter_sync, id);
    let blocked = thread::spawn(move || waiter.lock());
    assert!(eventually(Duration::from_secs(2), || {
        waiter_sync.is_held(&id)
    }));
    table.set_failing(true);

    assert!(matches!(
        blocked.join().unwrap(),
        Err(LockTableError::ServiceFailed(_))
    ));
}

#[test]
fn list_locks_reports_each_slot() {
    let table = MemoryTable::new();
    let sync = Synchronizer::new(table.clone(), fast_options());
    let held = LockId::random();
    let released = LockId::random();
    let leased = LockId::random();

    sync.register(&held, None).unwrap();
    sync.register(&released, None).unwrap();
    sync.register(&leased, Some(Duration::from_millis(1))).unwrap();
    sync.unregister(&released).unwrap();
    thread::sleep(Duration::from_millis(10));

    let infos = list_locks(&mut table.clone()).unwrap();
    let states: Vec<_> = infos.iter().map(|info| (info.id, info.state)).collect();
    assert_eq!(
        states,
        vec![
            (held, SlotState::Held),
            (released, SlotState::Free),
            (leased, SlotState::Expired),
        ]
    );
    assert!(infos[2].lease.is_some());
    assert_eq!(infos[2].remaining_string(chrono::Utc::now()).unwrap(), "expired");
}

#[test]
fn compact_table_only_truncates_when_everything_is_free() {
    let table = MemoryTable::new();
    let sync = Synchronizer::new(table.clone(), fast_options());
    let a = LockId::random();
    let b = LockId::random();

    sync.register(&a, None).unwrap();
    sync.register(&b, None).unwrap();
    sync.unregister(&a).unwrap();
    assert_eq!(compact_table(&mut table.clone()).unwrap(), None);

    sync.unregister(&b).unwrap();
    assert_eq!(compact_table(&mut table.clone()).unwrap(), Some(2));
    assert!(table.bytes().is_empty());
    assert_eq!(compact_table(&mut table.clone()).unwrap(), Some(0));
}

#[test]
fn remaining_lease_is_human_readable() {
    let now = chrono::Utc::now();
    let info = LockInfo {
        slot: 0,
        id: LockId::random(),
        state: SlotState::Held,
        lease: Some(now + chrono::Duration::seconds(90)),
    };
    assert_eq!(info.remaining_string(now).unwrap(), "1m 30s");

    let short = LockInfo {
        lease: Some(now + chrono::Duration::milliseconds(250)),
        ..info.clone()
    };
    assert_eq!(short.remaining_string(now).unwrap(), "250ms");

    let unleased = LockInfo { lease: None, ..info };
    assert!(unleased.remaining_string(now).is_none());
}
