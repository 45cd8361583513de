//! Configuration data types
//!
//! Typed sections of the config file. Absent fields take the documented
//! defaults; present values are range-checked by `Config::validate`.

use serde::{Deserialize, Serialize};

/// Camera capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_name")]
    pub name: String,
    /// Seconds between captures
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Captures accumulated before one sync batch
    #[serde(default = "default_captures_per_batch")]
    pub captures_per_batch: u32,
    #[serde(default)]
    pub hflip: bool,
    #[serde(default)]
    pub vflip: bool,
    #[serde(default)]
    pub rotation: Rotation,
    /// JPEG quality, 1..=100
    #[serde(default = "default_quality")]
    pub quality: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: default_camera_name(),
            interval_secs: default_interval(),
            captures_per_batch: default_captures_per_batch(),
            hflip: false,
            vflip: false,
            rotation: Rotation::default(),
            quality: default_quality(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_camera_name() -> String {
    "picam".to_string()
}
fn default_interval() -> u64 {
    20
}
fn default_captures_per_batch() -> u32 {
    3
}
fn default_quality() -> u32 {
    35
}
fn default_width() -> u32 {
    2592
}
fn default_height() -> u32 {
    1944
}

/// Image rotation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Default for Rotation {
    fn default() -> Self {
        Self::None
    }
}

impl Rotation {
    /// Rotation in degrees as passed to the capture tool
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Cw90),
            180 => Ok(Rotation::Cw180),
            270 => Ok(Rotation::Cw270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u32 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}

/// Remote sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Configured remote name in the transfer tool (e.g. "dropbox")
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
    /// Path under the remote root
    #[serde(default = "default_remote_path")]
    pub remote_path: String,
    #[serde(default)]
    pub operation_mode: OperationMode,
    #[serde(default = "default_true")]
    pub sync_logs: bool,
    #[serde(default = "default_true")]
    pub sync_on_shutdown: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_name: default_remote_name(),
            remote_path: default_remote_path(),
            operation_mode: OperationMode::default(),
            sync_logs: true,
            sync_on_shutdown: true,
        }
    }
}

fn default_remote_name() -> String {
    "dropbox".to_string()
}
fn default_remote_path() -> String {
    "pi_cam".to_string()
}
fn default_true() -> bool {
    true
}

/// Policy governing local file disposition after transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Files remain locally after a successful transfer
    Copy,
    /// Files are deleted locally after the transfer confirms success
    Move,
    /// Bidirectional reconciliation delegated to the transfer tool
    Sync,
}

impl Default for OperationMode {
    fn default() -> Self {
        Self::Copy
    }
}

impl OperationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Copy => "copy",
            OperationMode::Move => "move",
            OperationMode::Sync => "sync",
        }
    }
}

/// File archiving and retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManagementConfig {
    #[serde(default = "default_days_before_archive")]
    pub days_before_archive: u32,
    #[serde(default = "default_archive_retention_days")]
    pub archive_retention_days: u32,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
    #[serde(default = "default_min_free_space_mb")]
    pub min_free_space_mb: u64,
}

impl Default for FileManagementConfig {
    fn default() -> Self {
        Self {
            days_before_archive: default_days_before_archive(),
            archive_retention_days: default_archive_retention_days(),
            log_retention_days: default_log_retention_days(),
            min_free_space_mb: default_min_free_space_mb(),
        }
    }
}

fn default_days_before_archive() -> u32 {
    2
}
fn default_archive_retention_days() -> u32 {
    10
}
fn default_log_retention_days() -> u32 {
    7
}
fn default_min_free_space_mb() -> u64 {
    500
}

/// Startup safe-mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeModeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_safe_mode_delay")]
    pub delay_secs: u64,
    #[serde(default = "default_safe_mode_message")]
    pub message: String,
}

impl Default for SafeModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_secs: default_safe_mode_delay(),
            message: default_safe_mode_message(),
        }
    }
}

fn default_safe_mode_delay() -> u64 {
    180
}
fn default_safe_mode_message() -> String {
    "Safe mode active. Send SIGINT/SIGTERM to abort startup.".to_string()
}

/// Log verbosity, mapped onto tracing levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// Directive string for the tracing EnvFilter. CRITICAL collapses to
    /// error, the most severe level tracing distinguishes.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Auto-populated installation metadata. Written by the installer, read-only
/// here and never required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub install_path: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub camera_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub install_date: Option<String>,
}

/// Complete configuration snapshot, immutable after load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub file_management: FileManagementConfig,
    #[serde(default)]
    pub safe_mode: SafeModeConfig,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub system: SystemInfo,
}
