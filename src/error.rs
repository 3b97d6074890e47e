//! Error types for locktable.
//!
//! Uses thiserror for derive macros. Every variant maps to a CLI exit code so
//! the binary can report failures the same way the library surfaces them.

use crate::exit_codes;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for lock table operations.
#[derive(Error, Debug)]
pub enum LockTableError {
    /// Reading or writing the lock table failed.
    #[error("lock table I/O failed on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lock table contents violate the record layout.
    #[error("lock table is corrupt: {0}")]
    CorruptTable(String),

    /// An identifier did not satisfy the 36-byte layout.
    #[error("invalid lock identifier: {0}")]
    InvalidIdentifier(String),

    /// The background synchronizer died; cross-process state is no longer tracked.
    #[error("synchronizer failed: {0}")]
    ServiceFailed(String),

    /// A blocked wait was cut short because the synchronizer was stopped.
    #[error("wait aborted: {0}")]
    Aborted(String),

    /// The lock was still held when the caller's timeout elapsed.
    #[error("lock acquisition failed: {0}")]
    LockTimeout(String),

    /// Configuration could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(String),

    /// User provided invalid arguments.
    #[error("{0}")]
    UserError(String),
}

impl LockTableError {
    /// Wrap an I/O error with the path of the table it happened on.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        LockTableError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockTableError::Io { .. } => exit_codes::TABLE_FAILURE,
            LockTableError::CorruptTable(_) => exit_codes::TABLE_FAILURE,
            LockTableError::InvalidIdentifier(_) => exit_codes::USER_ERROR,
            LockTableError::ServiceFailed(_) => exit_codes::SERVICE_FAILURE,
            LockTableError::Aborted(_) => exit_codes::SERVICE_FAILURE,
            LockTableError::LockTimeout(_) => exit_codes::LOCK_FAILURE,
            LockTableError::Config(_) => exit_codes::USER_ERROR,
            LockTableError::UserError(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for lock table operations.
pub type Result<T> = std::result::Result<T, LockTableError>;
