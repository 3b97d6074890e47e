//! Configuration defaults for locktable.
//!
//! Default value functions used by serde when a field is missing from the
//! YAML file.

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".locktable.yaml";

/// Longest lease `default_lease_ms` may ask for (100 years).
pub const MAX_LEASE_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

/// Log levels accepted by `log_level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

// Default value functions for serde
pub(crate) fn default_table_path() -> String {
    ".locktable".to_string()
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    1
}
pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
pub(crate) fn default_true() -> bool {
    true
}
