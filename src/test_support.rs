use crate::sync::{SyncOptions, Synchronizer};
use crate::table::FileTable;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// A temp directory and the table path inside it.
pub(crate) fn temp_table() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".locktable");
    (dir, path)
}

pub(crate) fn fast_options() -> SyncOptions {
    SyncOptions {
        poll_interval: Duration::from_millis(1),
        stop_when_idle: true,
        default_lease: None,
    }
}

/// A synchronizer over its own handle to the table file, standing in for a
/// separate process.
pub(crate) fn file_sync(path: &Path) -> Synchronizer {
    Synchronizer::new(FileTable::open(path).unwrap(), fast_options())
}

pub(crate) fn table_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

/// Poll `condition` until it holds or `timeout` passes.
pub(crate) fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
