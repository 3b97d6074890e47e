//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for a lock table and its synchronizer.
///
/// This struct represents the contents of `.locktable.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Table settings
    // =========================================================================
    /// Path of the shared table file (default: ".locktable").
    #[serde(default = "default_table_path")]
    pub table_path: String,

    /// Whether every table write is flushed to disk before the advisory lock
    /// is released.
    #[serde(default)]
    pub sync_writes: bool,

    // =========================================================================
    // Synchronizer settings
    // =========================================================================
    /// Milliseconds between reconciliation passes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether the background thread exits when nothing is held or watched.
    #[serde(default = "default_true")]
    pub stop_when_idle: bool,

    /// Lease applied to locks that do not set their own. Unset means claims
    /// never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_lease_ms: Option<u64>,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_path: default_table_path(),
            sync_writes: false,
            poll_interval_ms: default_poll_interval_ms(),
            stop_when_idle: default_true(),
            default_lease_ms: None,
            log_level: default_log_level(),
        }
    }
}
