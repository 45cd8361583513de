//! Supervisor loop - top-level run/shutdown lifecycle
//!
//! ## Responsibilities
//!
//! - Run the safe-mode gate exactly once at startup
//! - Drive the capture scheduler on a fixed 1-second tick
//! - Invoke the sync orchestrator when a batch is ready
//! - Run lifecycle maintenance on its own coarser cadence
//! - On shutdown: leave the loop, run one bounded final sync, exit
//!
//! A single logical control loop owns every directory-mutating operation, so
//! captures, promotions, archive moves and purges never race each other.
//! Only a startup failure (config, camera probe) is fatal; every error after
//! that is logged and the loop continues.

use crate::camera::CameraDriver;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lifecycle::{DiskProbe, FileLifecycleManager};
use crate::safe_mode::{GateState, SafeModeGate};
use crate::scheduler::CaptureScheduler;
use crate::sync::{RemoteTransfer, SyncOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Scheduler tick granularity
const TICK_SECS: u64 = 1;
/// Lifecycle maintenance cadence
const MAINTENANCE_INTERVAL_SECS: u64 = 300;
/// Upper bound on the shutdown sync so an unreachable remote cannot hang exit
const SHUTDOWN_SYNC_TIMEOUT_SECS: u64 = 120;

/// Supervisor instance, owning all component state
pub struct Supervisor<C: CameraDriver, T: RemoteTransfer, D: DiskProbe, K: Clock> {
    config: Arc<Config>,
    scheduler: CaptureScheduler<C>,
    orchestrator: SyncOrchestrator<T>,
    lifecycle: FileLifecycleManager<D>,
    clock: K,
    gate: SafeModeGate,
    shutdown: watch::Receiver<bool>,
}

impl<C: CameraDriver, T: RemoteTransfer, D: DiskProbe, K: Clock> Supervisor<C, T, D, K> {
    pub fn new(
        config: Arc<Config>,
        scheduler: CaptureScheduler<C>,
        orchestrator: SyncOrchestrator<T>,
        lifecycle: FileLifecycleManager<D>,
        clock: K,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let gate = SafeModeGate::new(&config.safe_mode);
        Self {
            config,
            scheduler,
            orchestrator,
            lifecycle,
            clock,
            gate,
            shutdown,
        }
    }

    /// Run the daemon to completion.
    ///
    /// Returns Ok on graceful shutdown or safe-mode abort; Err only for
    /// fatal startup failures.
    pub async fn run(mut self) -> Result<()> {
        if self.gate.run(&mut self.shutdown).await == GateState::Aborted {
            info!("Startup aborted from safe mode");
            return Ok(());
        }

        // A missing camera at startup is fatal; after this point capture
        // failures only skip ticks.
        self.scheduler.probe().await.map_err(Error::Capture)?;

        info!(
            interval_secs = self.config.camera.interval_secs,
            captures_per_batch = self.config.camera.captures_per_batch,
            mode = self.config.sync.operation_mode.as_str(),
            "Starting capture loop"
        );

        self.lifecycle.run_maintenance(self.clock.now()).await;
        let mut last_maintenance = tokio::time::Instant::now();

        let mut ticker = interval(Duration::from_secs(TICK_SECS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.on_tick().await;

                    if last_maintenance.elapsed() >= Duration::from_secs(MAINTENANCE_INTERVAL_SECS) {
                        self.lifecycle.run_maintenance(self.clock.now()).await;
                        last_maintenance = tokio::time::Instant::now();
                    }
                }
                changed = self.shutdown.changed() => {
                    match changed {
                        Ok(()) if *self.shutdown.borrow() => break,
                        Ok(()) => {}
                        // Signal task gone; keep running, systemd can still SIGKILL
                        Err(_) => warn!("Shutdown channel closed unexpectedly"),
                    }
                }
            }
        }

        info!("Shutdown signal received, leaving capture loop");
        self.shutdown_sync().await;
        info!("Camera daemon stopped");
        Ok(())
    }

    async fn on_tick(&mut self) {
        match self.scheduler.tick(self.clock.now()).await {
            Ok(outcome) if outcome.batch_ready => {
                if let Err(e) = self.orchestrator.sync_batch().await {
                    warn!(error = %e, "Sync failed, batch kept for next sync point");
                }
            }
            Ok(_) => {}
            Err(e) => {
                // Recoverable: counter untouched, next tick retries
                error!(error = %e, "Capture failed, skipping tick");
            }
        }
    }

    /// Final best-effort sync, bounded so shutdown cannot hang
    async fn shutdown_sync(&self) {
        if !self.config.sync.sync_on_shutdown {
            return;
        }
        info!("Performing final sync before shutdown");
        let budget = Duration::from_secs(SHUTDOWN_SYNC_TIMEOUT_SECS);
        match tokio::time::timeout(budget, self.orchestrator.sync_batch()).await {
            Ok(Ok(outcome)) => {
                info!(
                    attempted = outcome.attempted,
                    failed = outcome.failed,
                    "Final sync complete"
                );
            }
            Ok(Err(e)) => warn!(error = %e, "Final sync failed"),
            Err(_) => warn!(
                timeout_secs = SHUTDOWN_SYNC_TIMEOUT_SECS,
                "Final sync timed out"
            ),
        }
    }
}
