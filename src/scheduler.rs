//! Capture scheduler - periodic acquisition into the staging area
//!
//! ## Responsibilities
//!
//! - Drive the camera driver on the configured interval
//! - Write each image to staging under a timestamp+sequence filename
//! - Count captures per batch and signal when a batch is ready
//!
//! The scheduler owns the only mutable capture state in the process: the
//! last-capture time, the batch counter and the filename sequence counter.
//! A failed capture leaves all three untouched so the next tick retries.

use crate::camera::{CameraDriver, CaptureParams};
use crate::config::CameraConfig;
use crate::error::CaptureError;
use crate::storage::StorageLayout;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// An image was captured and staged
    pub captured: bool,
    /// The batch threshold was reached; the counter has been reset
    pub batch_ready: bool,
}

impl TickOutcome {
    const IDLE: TickOutcome = TickOutcome {
        captured: false,
        batch_ready: false,
    };
}

/// Capture scheduler instance
pub struct CaptureScheduler<C: CameraDriver> {
    driver: C,
    params: CaptureParams,
    interval: Duration,
    captures_per_batch: u32,
    staging: PathBuf,
    camera_name: String,
    last_capture: Option<DateTime<Utc>>,
    batch_count: u32,
    seq: u64,
}

impl<C: CameraDriver> CaptureScheduler<C> {
    /// Create a scheduler from the camera config section
    pub fn new(driver: C, config: &CameraConfig, layout: &StorageLayout) -> Self {
        Self {
            driver,
            params: CaptureParams::from(config),
            interval: Duration::seconds(config.interval_secs as i64),
            captures_per_batch: config.captures_per_batch,
            staging: layout.staging.clone(),
            camera_name: config.name.clone(),
            last_capture: None,
            batch_count: 0,
            seq: 0,
        }
    }

    /// Verify the camera is reachable. Called once at startup.
    pub async fn probe(&self) -> Result<(), CaptureError> {
        self.driver.probe().await
    }

    /// Captures accumulated since the last batch
    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    /// Run one scheduling tick.
    ///
    /// Captures when the interval has elapsed since the last successful
    /// capture (or immediately on the first tick). On `CaptureError` the
    /// batch counter and last-capture time are left untouched; the error
    /// propagates and the next tick retries.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, CaptureError> {
        let due = match self.last_capture {
            None => true,
            Some(last) => now - last >= self.interval,
        };
        if !due {
            return Ok(TickOutcome::IDLE);
        }

        let image = self.driver.capture(&self.params).await?;

        let filename = StorageLayout::image_filename(now, self.seq);
        let path = self.staging.join(&filename);
        tokio::fs::write(&path, &image)
            .await
            .map_err(|source| CaptureError::Write {
                path: path.clone(),
                source,
            })?;

        self.seq = self.seq.wrapping_add(1);
        self.last_capture = Some(now);
        self.batch_count += 1;

        tracing::info!(
            camera = %self.camera_name,
            path = %path.display(),
            size = image.len(),
            batch_count = self.batch_count,
            "Image captured"
        );

        let batch_ready = self.batch_count >= self.captures_per_batch;
        if batch_ready {
            self.batch_count = 0;
        }

        Ok(TickOutcome {
            captured: true,
            batch_ready,
        })
    }
}
