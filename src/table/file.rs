//! The lock table as a shared file, coordinated with OS advisory locks.
//!
//! Locking goes through `fs2` (`flock(2)` on Unix, `LockFileEx` on Windows).
//! Each [`FileTable`] owns its own open file, so two tables opened on the same
//! path exclude each other even inside one process.

use super::store::TableStore;
use crate::error::{LockTableError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct FileTable {
    path: PathBuf,
    file: File,
    sync_writes: bool,
}

impl FileTable {
    /// Open (creating if needed) the table file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| LockTableError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| LockTableError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sync_writes: false,
        })
    }

    /// Flush every write to disk before returning.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, e: std::io::Error) -> LockTableError {
        LockTableError::io(&self.path, e)
    }

    fn maybe_sync(&self) -> Result<()> {
        if self.sync_writes {
            self.file.sync_data().map_err(|e| self.err(e))?;
        }
        Ok(())
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl TableStore for FileTable {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn lock(&mut self) -> Result<()> {
        FileExt::lock_exclusive(&self.file).map_err(|e| self.err(e))
    }

    fn try_lock(&mut self) -> Result<bool> {
        match FileExt::try_lock_exclusive(&self.file) {
            Ok(()) => Ok(true),
            Err(ref e) if is_contended(e) => Ok(false),
            Err(e) => Err(self.err(e)),
        }
    }

    fn unlock(&mut self) -> Result<()> {
        FileExt::unlock(&self.file).map_err(|e| self.err(e))
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.err(e))?;
        self.file
            .read_to_end(&mut bytes)
            .map_err(|e| self.err(e))?;
        Ok(bytes)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| self.err(e))?;
        self.file.write_all(bytes).map_err(|e| self.err(e))?;
        self.maybe_sync()
    }

    fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0).map_err(|e| self.err(e))?;
        self.maybe_sync()
    }
}
