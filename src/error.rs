//! Error handling for picamd
//!
//! Four domain error types with different recovery policies:
//! - `ConfigError` is fatal at startup
//! - `CaptureError` skips the current tick
//! - `TransferError` is retried at the next sync point
//! - `LifecycleError` skips the affected file and continues the scan

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration load/validation errors. Fatal, startup only.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file missing or unreadable
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed JSON structure
    #[error("Malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A present value is out of its documented range
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Image acquisition errors. Recoverable, the tick is skipped.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Capture tool could not be spawned
    #[error("Failed to spawn capture tool: {0}")]
    Spawn(std::io::Error),

    /// Capture tool exited with an error
    #[error("Capture failed: {0}")]
    Tool(String),

    /// Capture tool exceeded its time budget
    #[error("Capture timed out after {0}s")]
    Timeout(u64),

    /// No camera detected at startup probe
    #[error("Camera not detected: {0}")]
    NotDetected(String),

    /// Writing the captured image to staging failed
    #[error("Failed to write image {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Remote transfer errors. Recoverable, retried at the next sync point.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Transfer tool could not be spawned
    #[error("Failed to spawn transfer tool: {0}")]
    Spawn(std::io::Error),

    /// Transfer tool exited with an error (remote unreachable etc.)
    #[error("Transfer failed: {0}")]
    Tool(String),

    /// Transfer tool exceeded its time budget
    #[error("Transfer timed out after {0}s")]
    Timeout(u64),

    /// Local directory enumeration before the transfer failed
    #[error("Cannot enumerate {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// File lifecycle errors. Recoverable per-file, the scan continues.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Directory scan failed as a whole
    #[error("Cannot scan {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Free-space probe could not resolve the storage volume
    #[error("Cannot determine free space for {path}")]
    SpaceProbe { path: PathBuf },
}

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
