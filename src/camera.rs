//! Camera driver - image acquisition collaborator
//!
//! ## Responsibilities
//!
//! - `CameraDriver` seam between the scheduler and the capture hardware
//! - `RpicamStill` production driver shelling out to rpicam-still
//!
//! The driver returns JPEG bytes; where they land is the scheduler's
//! business. All subprocess calls carry a bounded timeout with
//! `kill_on_drop` so a hung camera stack cannot stall the control loop or
//! leak processes.

use crate::config::CameraConfig;
use crate::error::CaptureError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default time budget for one still capture
const CAPTURE_TIMEOUT_SECS: u64 = 30;
/// Time budget for the startup camera probe
const PROBE_TIMEOUT_SECS: u64 = 10;

/// Parameters for one capture, derived from the camera config section
#[derive(Debug, Clone)]
pub struct CaptureParams {
    pub width: u32,
    pub height: u32,
    pub quality: u32,
    pub rotation_degrees: u32,
    pub hflip: bool,
    pub vflip: bool,
}

impl From<&CameraConfig> for CaptureParams {
    fn from(cfg: &CameraConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            quality: cfg.quality,
            rotation_degrees: cfg.rotation.degrees(),
            hflip: cfg.hflip,
            vflip: cfg.vflip,
        }
    }
}

/// Image acquisition seam.
///
/// Implementations must be self-bounding in time: a capture either returns
/// within its budget or fails with `CaptureError::Timeout`.
pub trait CameraDriver: Send + Sync {
    /// Acquire one JPEG image
    fn capture(
        &self,
        params: &CaptureParams,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, CaptureError>> + Send;

    /// Verify the camera is connected and functioning
    fn probe(&self) -> impl std::future::Future<Output = Result<(), CaptureError>> + Send;
}

/// Production driver using the rpicam-still CLI
pub struct RpicamStill {
    timeout_secs: u64,
}

impl RpicamStill {
    pub fn new() -> Self {
        Self {
            timeout_secs: CAPTURE_TIMEOUT_SECS,
        }
    }

    fn build_args(params: &CaptureParams) -> Vec<String> {
        // -o -  : JPEG to stdout
        // -n    : skip preview window
        let mut args = vec![
            "-o".to_string(),
            "-".to_string(),
            "--quality".to_string(),
            params.quality.to_string(),
            "--width".to_string(),
            params.width.to_string(),
            "--height".to_string(),
            params.height.to_string(),
            "-n".to_string(),
        ];
        if params.rotation_degrees != 0 {
            args.push("--rotation".to_string());
            args.push(params.rotation_degrees.to_string());
        }
        if params.hflip {
            args.push("--hflip".to_string());
        }
        if params.vflip {
            args.push("--vflip".to_string());
        }
        args
    }
}

impl Default for RpicamStill {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDriver for RpicamStill {
    /// Capture one frame via rpicam-still.
    ///
    /// `kill_on_drop(true)` means that when the timeout fires and the future
    /// is cancelled, the dropped Child sends SIGKILL to the capture process,
    /// so unresponsive hardware never accumulates zombie processes.
    async fn capture(&self, params: &CaptureParams) -> Result<Vec<u8>, CaptureError> {
        let child = Command::new("rpicam-still")
            .args(Self::build_args(params))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        let budget = Duration::from_secs(self.timeout_secs);
        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(CaptureError::Tool(stderr.trim().to_string()));
                }
                if output.stdout.is_empty() {
                    return Err(CaptureError::Tool(
                        "rpicam-still returned empty output".to_string(),
                    ));
                }
                Ok(output.stdout)
            }
            Ok(Err(e)) => Err(CaptureError::Tool(format!("rpicam-still failed: {}", e))),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout_secs,
                    "Capture timeout, process killed via kill_on_drop"
                );
                Err(CaptureError::Timeout(self.timeout_secs))
            }
        }
    }

    /// Check for an attached camera via `rpicam-hello --list-cameras`
    async fn probe(&self) -> Result<(), CaptureError> {
        let child = Command::new("rpicam-hello")
            .args(["--list-cameras"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        let budget = Duration::from_secs(PROBE_TIMEOUT_SECS);
        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if output.status.success() && stdout.contains("Available cameras") {
                    tracing::debug!("Camera detected");
                    Ok(())
                } else {
                    Err(CaptureError::NotDetected(
                        String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    ))
                }
            }
            Ok(Err(e)) => Err(CaptureError::NotDetected(e.to_string())),
            Err(_) => Err(CaptureError::Timeout(PROBE_TIMEOUT_SECS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rotation;

    fn params() -> CaptureParams {
        CaptureParams {
            width: 1920,
            height: 1080,
            quality: 80,
            rotation_degrees: 0,
            hflip: false,
            vflip: false,
        }
    }

    #[test]
    fn base_args_omit_optional_flags() {
        let args = RpicamStill::build_args(&params());
        assert!(args.contains(&"--quality".to_string()));
        assert!(!args.contains(&"--rotation".to_string()));
        assert!(!args.contains(&"--hflip".to_string()));
        assert!(!args.contains(&"--vflip".to_string()));
    }

    #[test]
    fn optional_flags_added_when_set() {
        let mut p = params();
        p.rotation_degrees = Rotation::Cw90.degrees();
        p.hflip = true;
        p.vflip = true;
        let args = RpicamStill::build_args(&p);
        let rotation_idx = args.iter().position(|a| a == "--rotation").unwrap();
        assert_eq!(args[rotation_idx + 1], "90");
        assert!(args.contains(&"--hflip".to_string()));
        assert!(args.contains(&"--vflip".to_string()));
    }
}
