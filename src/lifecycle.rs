//! File lifecycle manager - archiving, retention, space-pressure purge
//!
//! ## Responsibilities
//!
//! - Age staged/active images into the archive after `days_before_archive`
//! - Purge archive images past `archive_retention_days` and logs past
//!   `log_retention_days`
//! - Purge archive oldest-first when free space drops below
//!   `min_free_space_mb`, regardless of the retention floor
//!
//! Unbounded disk growth is the primary operational risk on an unattended
//! device, so low disk space always wins over retention policy. Every
//! per-file failure is logged and skipped; a maintenance pass never aborts
//! mid-scan. All mutations stay inside the managed directories.

use crate::config::FileManagementConfig;
use crate::error::LifecycleError;
use crate::storage::StorageLayout;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use sysinfo::Disks;

/// Free-space probe seam for the storage volume
pub trait DiskProbe: Send + Sync {
    /// Available megabytes on the volume holding `path`
    fn available_mb(&self, path: &Path) -> Result<u64, LifecycleError>;
}

/// Production probe backed by sysinfo
pub struct SysinfoDisks;

impl DiskProbe for SysinfoDisks {
    fn available_mb(&self, path: &Path) -> Result<u64, LifecycleError> {
        let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let disks = Disks::new_with_refreshed_list();

        // Longest mount-point prefix wins (e.g. /var/lib over /)
        let disk = disks
            .list()
            .iter()
            .filter(|d| resolved.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .ok_or_else(|| LifecycleError::SpaceProbe {
                path: path.to_path_buf(),
            })?;

        Ok(disk.available_space() / (1024 * 1024))
    }
}

/// Counts from one maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub archived: usize,
    pub purged_archives: usize,
    pub purged_logs: usize,
    pub purged_for_space: usize,
}

/// File lifecycle manager instance
pub struct FileLifecycleManager<D: DiskProbe> {
    layout: StorageLayout,
    config: FileManagementConfig,
    probe: D,
}

impl<D: DiskProbe> FileLifecycleManager<D> {
    pub fn new(layout: StorageLayout, config: &FileManagementConfig, probe: D) -> Self {
        Self {
            layout,
            config: config.clone(),
            probe,
        }
    }

    /// Run one full maintenance pass: archive aged images, purge expired
    /// archives and logs, then recover free space if the volume is low.
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> MaintenanceReport {
        let report = MaintenanceReport {
            archived: self.archive_aged(now).await,
            purged_archives: self.purge_expired_archives(now).await,
            purged_logs: self.purge_expired_logs(now).await,
            purged_for_space: self.enforce_free_space().await,
        };

        tracing::info!(
            archived = report.archived,
            purged_archives = report.purged_archives,
            purged_logs = report.purged_logs,
            purged_for_space = report.purged_for_space,
            "Maintenance pass complete"
        );
        report
    }

    /// Move staged-or-active images older than `days_before_archive` into
    /// the archive. Age is measured from the capture timestamp embedded in
    /// the filename, not mtime, so it stays correct across clock
    /// adjustments.
    pub async fn archive_aged(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.config.days_before_archive as i64);
        let mut archived = 0;

        for area in [&self.layout.staging, &self.layout.active] {
            let entries = match StorageLayout::scan_images(area).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = %area.display(), error = %e, "Archive scan failed");
                    continue;
                }
            };

            for entry in entries {
                if entry.captured_at >= cutoff {
                    continue;
                }
                let dest = self.layout.archive.join(
                    entry
                        .path
                        .file_name()
                        .unwrap_or_else(|| std::ffi::OsStr::new("unnamed.jpg")),
                );
                match tokio::fs::rename(&entry.path, &dest).await {
                    Ok(()) => {
                        tracing::debug!(
                            from = %entry.path.display(),
                            to = %dest.display(),
                            "Archived image"
                        );
                        archived += 1;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        // Vanished mid-scan, e.g. a concurrent manual cleanup
                        tracing::debug!(path = %entry.path.display(), "File vanished before archive");
                    }
                    Err(e) => {
                        tracing::warn!(path = %entry.path.display(), error = %e, "Archive move failed");
                    }
                }
            }
        }
        archived
    }

    /// Delete archive images older than `archive_retention_days`
    pub async fn purge_expired_archives(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.config.archive_retention_days as i64);
        let entries = match StorageLayout::scan_images(&self.layout.archive).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Archive retention scan failed");
                return 0;
            }
        };

        let mut purged = 0;
        for entry in entries {
            if entry.captured_at >= cutoff {
                continue;
            }
            if self.remove_file(&entry.path, "expired archive").await {
                purged += 1;
            }
        }
        purged
    }

    /// Delete log files older than `log_retention_days`. Age comes from the
    /// date in the rolled filename when parseable, mtime otherwise.
    pub async fn purge_expired_logs(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(self.config.log_retention_days as i64);
        let mut read_dir = match tokio::fs::read_dir(&self.layout.logs).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(error = %e, "Log retention scan failed");
                return 0;
            }
        };

        let mut purged = 0;
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Log retention scan interrupted");
                    break;
                }
            };

            let name = entry.file_name();
            let aged = match StorageLayout::log_date_from_name(&name.to_string_lossy()) {
                Some(date) => date < cutoff.date_naive(),
                None => match entry.metadata().await {
                    Ok(meta) if meta.is_file() => meta
                        .modified()
                        .map(|mtime| DateTime::<Utc>::from(mtime) < cutoff)
                        .unwrap_or(false),
                    _ => false,
                },
            };

            if aged && self.remove_file(&entry.path(), "expired log").await {
                purged += 1;
            }
        }
        purged
    }

    /// Delete archive images oldest-first until free space recovers above
    /// `min_free_space_mb` or the archive is exhausted. Ignores the
    /// retention floor: low disk space always wins.
    pub async fn enforce_free_space(&self) -> usize {
        let threshold = self.config.min_free_space_mb;
        match self.probe.available_mb(&self.layout.archive) {
            Ok(free) if free >= threshold => return 0,
            Ok(free) => {
                tracing::warn!(
                    free_mb = free,
                    min_free_mb = threshold,
                    "Low disk space, purging archive oldest-first"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Free space probe failed, skipping space purge");
                return 0;
            }
        }

        let entries = match StorageLayout::scan_images(&self.layout.archive).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Space purge scan failed");
                return 0;
            }
        };

        let mut purged = 0;
        for entry in entries {
            if self.remove_file(&entry.path, "space pressure").await {
                purged += 1;
            }

            match self.probe.available_mb(&self.layout.archive) {
                Ok(free) if free >= threshold => {
                    tracing::info!(free_mb = free, purged, "Disk space recovered");
                    return purged;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Free space probe failed mid-purge");
                    return purged;
                }
            }
        }

        tracing::error!(
            purged,
            min_free_mb = threshold,
            "Archive exhausted but disk space still below threshold"
        );
        purged
    }

    async fn remove_file(&self, path: &Path, reason: &str) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), reason, "Removed file");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "File vanished before removal");
                false
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Removal failed");
                false
            }
        }
    }
}
