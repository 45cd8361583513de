//! Sync orchestrator - batched upload to remote storage
//!
//! ## Responsibilities
//!
//! - Promote staged images into the active area (atomic rename)
//! - Transfer the active area, and optionally the logs area, to the remote
//! - Apply the configured operation mode to local files afterwards
//!
//! Pending-sync files always live in the active area: promotion happens at
//! the top of `sync_batch`, before the transfer, so a failed batch stays in
//! active and is retried wholesale at the next sync point. The transfer
//! collaborator never deletes local files; move-mode deletion happens here,
//! and only after the collaborator confirms zero failures.

use crate::config::{OperationMode, SyncConfig};
use crate::error::TransferError;
use crate::storage::StorageLayout;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Time budget for one transfer-tool invocation
const TRANSFER_TIMEOUT_SECS: u64 = 300;

/// Per-invocation transfer counts reported by the collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Outcome of one sync batch. Reporting only, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub logs_included: bool,
}

/// Remote transfer seam.
///
/// Contract: transfer the contents of `local_dir` to `remote_target` under
/// `mode`, within a bounded time. Implementations never delete local files;
/// local disposition is the orchestrator's job.
pub trait RemoteTransfer: Send + Sync {
    fn transfer(
        &self,
        local_dir: &Path,
        remote_target: &str,
        mode: OperationMode,
    ) -> impl std::future::Future<Output = Result<TransferReport, TransferError>> + Send;
}

/// Production transfer backed by the rclone CLI.
///
/// Copy and move batches both run `rclone copy` (move-mode deletion is the
/// orchestrator's, delete-after-confirm); two-way mode delegates to
/// `rclone sync` wholesale.
pub struct RcloneTransfer {
    timeout_secs: u64,
}

impl RcloneTransfer {
    pub fn new() -> Self {
        Self {
            timeout_secs: TRANSFER_TIMEOUT_SECS,
        }
    }

    fn subcommand(mode: OperationMode) -> &'static str {
        match mode {
            OperationMode::Copy | OperationMode::Move => "copy",
            OperationMode::Sync => "sync",
        }
    }
}

impl Default for RcloneTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteTransfer for RcloneTransfer {
    async fn transfer(
        &self,
        local_dir: &Path,
        remote_target: &str,
        mode: OperationMode,
    ) -> Result<TransferReport, TransferError> {
        let attempted = StorageLayout::count_files(local_dir)
            .await
            .map_err(|source| TransferError::Scan {
                path: local_dir.to_path_buf(),
                source,
            })? as u64;
        if attempted == 0 {
            return Ok(TransferReport::default());
        }

        let child = Command::new("rclone")
            .arg(Self::subcommand(mode))
            .arg(local_dir)
            .arg(remote_target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TransferError::Spawn)?;

        let budget = Duration::from_secs(self.timeout_secs);
        match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(TransferReport {
                        attempted,
                        succeeded: attempted,
                        failed: 0,
                    })
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(TransferError::Tool(stderr.trim().to_string()))
                }
            }
            Ok(Err(e)) => Err(TransferError::Tool(format!("rclone failed: {}", e))),
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout_secs,
                    "Transfer timeout, process killed via kill_on_drop"
                );
                Err(TransferError::Timeout(self.timeout_secs))
            }
        }
    }
}

/// Sync orchestrator instance
pub struct SyncOrchestrator<T: RemoteTransfer> {
    transfer: T,
    layout: StorageLayout,
    config: SyncConfig,
}

impl<T: RemoteTransfer> SyncOrchestrator<T> {
    pub fn new(transfer: T, layout: StorageLayout, config: &SyncConfig) -> Self {
        Self {
            transfer,
            layout,
            config: config.clone(),
        }
    }

    fn images_target(&self) -> String {
        format!(
            "{}:{}/images",
            self.config.remote_name, self.config.remote_path
        )
    }

    fn logs_target(&self) -> String {
        format!("{}:{}/logs", self.config.remote_name, self.config.remote_path)
    }

    /// Run one sync batch.
    ///
    /// A transfer failure is returned as `Err` but is recoverable by
    /// contract: local files are left untouched and the next scheduled sync
    /// retries the whole batch. A report with a non-zero failure count
    /// likewise leaves local files alone.
    pub async fn sync_batch(&self) -> Result<SyncOutcome, TransferError> {
        self.promote_staging().await?;

        let pending = StorageLayout::count_files(&self.layout.active)
            .await
            .map_err(|source| TransferError::Scan {
                path: self.layout.active.clone(),
                source,
            })?;

        let mut outcome = SyncOutcome::default();

        if pending > 0 {
            let mode = self.config.operation_mode;
            let report = self
                .transfer
                .transfer(&self.layout.active, &self.images_target(), mode)
                .await?;

            outcome.attempted = report.attempted;
            outcome.succeeded = report.succeeded;
            outcome.failed = report.failed;

            if report.failed > 0 {
                warn!(
                    attempted = report.attempted,
                    failed = report.failed,
                    "Partial transfer failure, batch will be retried"
                );
            } else if mode == OperationMode::Move {
                // Delete-after-confirm: only reached with zero failures
                self.clear_active().await;
            }
        }

        // Logs always go with copy semantics; sync never deletes logs
        if self.config.sync_logs {
            match self
                .transfer
                .transfer(&self.layout.logs, &self.logs_target(), OperationMode::Copy)
                .await
            {
                Ok(_) => outcome.logs_included = true,
                Err(e) => {
                    warn!(error = %e, "Log transfer failed, will retry at next sync");
                }
            }
        }

        info!(
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            logs_included = outcome.logs_included,
            mode = self.config.operation_mode.as_str(),
            "Sync batch complete"
        );
        Ok(outcome)
    }

    /// Rename every staged file into the active area. Rename keeps the
    /// lifecycle one-way with no copy-then-delete window; a file that
    /// vanishes mid-promotion is skipped.
    async fn promote_staging(&self) -> Result<(), TransferError> {
        let entries = StorageLayout::scan_images(&self.layout.staging)
            .await
            .map_err(|source| TransferError::Scan {
                path: self.layout.staging.clone(),
                source,
            })?;

        for entry in entries {
            let Some(name) = entry.path.file_name() else {
                continue;
            };
            let dest = self.layout.active.join(name);
            match tokio::fs::rename(&entry.path, &dest).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "Promotion to active failed");
                }
            }
        }
        Ok(())
    }

    /// Remove confirmed-transferred files from the active area (move mode)
    async fn clear_active(&self) {
        let entries = match StorageLayout::scan_images(&self.layout.active).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Post-transfer cleanup scan failed");
                return;
            }
        };
        for entry in entries {
            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "Post-transfer removal failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct RecordedCall {
        local_dir: PathBuf,
        remote_target: String,
        mode: OperationMode,
    }

    /// Transfer stub recording calls and replaying scripted results
    struct FakeTransfer {
        calls: Mutex<Vec<RecordedCall>>,
        results: Mutex<Vec<Result<TransferReport, TransferError>>>,
    }

    impl FakeTransfer {
        fn new(results: Vec<Result<TransferReport, TransferError>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                results: Mutex::new(results),
            }
        }

        fn ok(attempted: u64) -> Result<TransferReport, TransferError> {
            Ok(TransferReport {
                attempted,
                succeeded: attempted,
                failed: 0,
            })
        }
    }

    impl RemoteTransfer for FakeTransfer {
        async fn transfer(
            &self,
            local_dir: &Path,
            remote_target: &str,
            mode: OperationMode,
        ) -> Result<TransferReport, TransferError> {
            self.calls.lock().unwrap().push(RecordedCall {
                local_dir: local_dir.to_path_buf(),
                remote_target: remote_target.to_string(),
                mode,
            });
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                FakeTransfer::ok(0)
            } else {
                results.remove(0)
            }
        }
    }

    async fn layout_in(dir: &Path) -> StorageLayout {
        let layout = StorageLayout::new(dir);
        layout.ensure_dirs().await.unwrap();
        layout
    }

    async fn stage_images(layout: &StorageLayout, count: u64) {
        let ts = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        for seq in 0..count {
            let path = layout
                .staging
                .join(StorageLayout::image_filename(ts, seq));
            tokio::fs::write(&path, b"jpeg").await.unwrap();
        }
    }

    fn sync_config(mode: OperationMode, sync_logs: bool) -> SyncConfig {
        SyncConfig {
            operation_mode: mode,
            sync_logs,
            ..SyncConfig::default()
        }
    }

    #[tokio::test]
    async fn staged_files_promote_to_active_before_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 3).await;

        let transfer = FakeTransfer::new(vec![FakeTransfer::ok(3)]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Copy, false));
        orchestrator.sync_batch().await.unwrap();

        let calls = orchestrator.transfer.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].local_dir, layout.active);
        assert_eq!(calls[0].remote_target, "dropbox:pi_cam/images");
        assert_eq!(
            StorageLayout::count_files(&layout.staging).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn copy_mode_never_deletes_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 2).await;

        let transfer = FakeTransfer::new(vec![FakeTransfer::ok(2)]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Copy, false));
        let outcome = orchestrator.sync_batch().await.unwrap();

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(StorageLayout::count_files(&layout.active).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn move_mode_deletes_only_after_confirmed_success() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 2).await;

        let transfer = FakeTransfer::new(vec![FakeTransfer::ok(2)]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Move, false));
        orchestrator.sync_batch().await.unwrap();

        assert_eq!(StorageLayout::count_files(&layout.active).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn move_mode_keeps_files_on_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 3).await;

        let transfer = FakeTransfer::new(vec![Ok(TransferReport {
            attempted: 3,
            succeeded: 2,
            failed: 1,
        })]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Move, false));
        let outcome = orchestrator.sync_batch().await.unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(StorageLayout::count_files(&layout.active).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn transfer_failure_leaves_batch_in_active_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 2).await;

        let transfer = FakeTransfer::new(vec![
            Err(TransferError::Tool("remote unreachable".to_string())),
            FakeTransfer::ok(2),
        ]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Move, false));

        assert!(orchestrator.sync_batch().await.is_err());
        assert_eq!(StorageLayout::count_files(&layout.active).await.unwrap(), 2);

        // Next sync point retries the same batch wholesale and succeeds
        orchestrator.sync_batch().await.unwrap();
        assert_eq!(StorageLayout::count_files(&layout.active).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn logs_transfer_follows_sync_logs_flag() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 1).await;

        let transfer = FakeTransfer::new(vec![FakeTransfer::ok(1), FakeTransfer::ok(1)]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Copy, true));
        let outcome = orchestrator.sync_batch().await.unwrap();

        assert!(outcome.logs_included);
        let calls = orchestrator.transfer.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].local_dir, layout.logs);
        assert_eq!(calls[1].remote_target, "dropbox:pi_cam/logs");
        // Logs always transfer with copy semantics
        assert_eq!(calls[1].mode, OperationMode::Copy);
    }

    #[tokio::test]
    async fn empty_batch_without_logs_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;

        let transfer = FakeTransfer::new(vec![]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Copy, false));
        let outcome = orchestrator.sync_batch().await.unwrap();

        assert_eq!(outcome, SyncOutcome::default());
        assert!(orchestrator.transfer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_mode_is_a_single_delegated_call() {
        let dir = tempfile::tempdir().unwrap();
        let layout = layout_in(dir.path()).await;
        stage_images(&layout, 2).await;

        let transfer = FakeTransfer::new(vec![FakeTransfer::ok(2)]);
        let orchestrator =
            SyncOrchestrator::new(transfer, layout.clone(), &sync_config(OperationMode::Sync, false));
        orchestrator.sync_batch().await.unwrap();

        let calls = orchestrator.transfer.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].mode, OperationMode::Sync);
        // Local files untouched; reconciliation is the tool's business
        assert_eq!(StorageLayout::count_files(&layout.active).await.unwrap(), 2);
    }

    #[test]
    fn rclone_subcommand_mapping() {
        assert_eq!(RcloneTransfer::subcommand(OperationMode::Copy), "copy");
        assert_eq!(RcloneTransfer::subcommand(OperationMode::Move), "copy");
        assert_eq!(RcloneTransfer::subcommand(OperationMode::Sync), "sync");
    }
}
