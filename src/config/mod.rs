//! Config model - validated, immutable configuration snapshot
//!
//! ## Responsibilities
//!
//! - Load the JSON config file from disk
//! - Apply documented defaults for absent fields
//! - Reject out-of-range values that are explicitly present
//!
//! Loading is the only point where configuration enters the process. No
//! component mutates a loaded `Config`; it is passed around behind `Arc`.

mod types;

pub use types::{
    CameraConfig, Config, FileManagementConfig, LogLevel, OperationMode, Rotation, SafeModeConfig,
    SyncConfig, SystemInfo,
};

use crate::error::ConfigError;
use std::path::Path;

impl Config {
    /// Load and validate configuration from a JSON file.
    ///
    /// Fails on a missing file, malformed structure, or any out-of-range
    /// value. Invalid present values are never silently replaced with
    /// defaults.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Range-check every numeric field.
    ///
    /// Enum-valued fields (rotation, operation mode, log level) are already
    /// rejected at deserialization time by their serde representations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.interval_secs == 0 {
            return Err(invalid("camera.interval_secs", "must be greater than 0"));
        }
        if self.camera.captures_per_batch == 0 {
            return Err(invalid(
                "camera.captures_per_batch",
                "must be at least 1",
            ));
        }
        if self.camera.quality < 1 || self.camera.quality > 100 {
            return Err(invalid("camera.quality", "must be in 1..=100"));
        }
        if self.camera.width == 0 {
            return Err(invalid("camera.width", "must be greater than 0"));
        }
        if self.camera.height == 0 {
            return Err(invalid("camera.height", "must be greater than 0"));
        }
        if self.sync.remote_name.is_empty() {
            return Err(invalid("sync.remote_name", "must not be empty"));
        }
        if self.sync.remote_path.is_empty() {
            return Err(invalid("sync.remote_path", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
