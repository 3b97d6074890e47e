//! Config loading, validation, and utility operations.

use super::model::Config;
use super::types::{CONFIG_FILE_NAME, LOG_LEVELS, MAX_LEASE_MS};
use crate::error::{LockTableError, Result};
use crate::sync::SyncOptions;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(LockTableError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockTableError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load `explicit` if given, else `.locktable.yaml` from the working
    /// directory if it exists, else the defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(CONFIG_FILE_NAME);
        if local.is_file() {
            tracing::debug!(path = CONFIG_FILE_NAME, "loading config from working directory");
            return Self::load(local);
        }
        Ok(Self::default())
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document is the same as an empty mapping.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| LockTableError::Config(format!("failed to parse config YAML: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            LockTableError::Config(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `table_path` must be non-empty
    /// - `poll_interval_ms` must be positive
    /// - `default_lease_ms`, when set, must be positive and at most 100 years
    /// - `log_level` must be a known level
    pub fn validate(&self) -> Result<()> {
        if self.table_path.trim().is_empty() {
            return Err(LockTableError::Config(
                "config validation failed: table_path must not be empty".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(LockTableError::Config(
                "config validation failed: poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.default_lease_ms == Some(0) {
            return Err(LockTableError::Config(
                "config validation failed: default_lease_ms must be greater than 0 when set"
                    .to_string(),
            ));
        }

        if let Some(lease) = self.default_lease_ms
            && lease > MAX_LEASE_MS
        {
            return Err(LockTableError::Config(format!(
                "config validation failed: default_lease_ms must be at most {} (found {})",
                MAX_LEASE_MS, lease
            )));
        }

        let level = self.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(LockTableError::Config(format!(
                "config validation failed: unknown log_level '{}' (expected one of: {})",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Synchronizer tuning derived from this config.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stop_when_idle: self.stop_when_idle,
            default_lease: self.default_lease_ms.map(Duration::from_millis),
        }
    }
}
