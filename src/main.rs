//! picamd - unattended interval-capture camera daemon
//!
//! Main entry point: load config, set up logging, wire components, run the
//! supervisor until a shutdown signal arrives.

use picamd::camera::RpicamStill;
use picamd::clock::SystemClock;
use picamd::config::Config;
use picamd::lifecycle::{FileLifecycleManager, SysinfoDisks};
use picamd::scheduler::CaptureScheduler;
use picamd::storage::StorageLayout;
use picamd::supervisor::Supervisor;
use picamd::sync::{RcloneTransfer, SyncOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Config file path: `PICAMD_CONFIG` env var, else `config.json` next to the
/// base directory
fn config_path() -> PathBuf {
    std::env::var("PICAMD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| base_dir().join("config.json"))
}

/// Base directory for storage areas: `PICAMD_BASE` env var, else the
/// installation path recorded in the config, else the working directory
fn base_dir() -> PathBuf {
    std::env::var("PICAMD_BASE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn init_logging(
    config: &Config,
    logs_dir: &std::path::Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let directive = config.log_level.as_filter_directive();
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("picamd={}", directive)))
    };

    // Daily-rolled file layer; retention and log sync operate on these files
    let mut guard = None;
    let file_layer = match std::fs::create_dir_all(logs_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(logs_dir, "picamd.log");
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(env_filter()),
            )
        }
        Err(e) => {
            eprintln!("Cannot create logs dir {}: {}", logs_dir.display(), e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter()))
        .with(file_layer)
        .init();
    guard
}

/// Fan SIGINT and SIGTERM into the shutdown channel. The same signal both
/// aborts safe mode and triggers graceful shutdown.
fn spawn_signal_listener(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install SIGINT handler");
            }
        };
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
            }
        };

        tokio::select! {
            _ = ctrl_c => tracing::info!("SIGINT received"),
            _ = terminate => tracing::info!("SIGTERM received"),
        }
        let _ = tx.send(true);
    });
}

#[tokio::main]
async fn main() {
    let path = config_path();
    let config = match Config::load(&path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            // Logging is not up yet; config failure is the one fatal startup path
            eprintln!("picamd: {}", e);
            std::process::exit(1);
        }
    };

    let base = match config.system.install_path.as_deref() {
        Some(install) if std::env::var("PICAMD_BASE").is_err() => PathBuf::from(install),
        _ => base_dir(),
    };
    let layout = StorageLayout::new(&base);

    let _log_guard = init_logging(&config, &layout.logs);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        base = %base.display(),
        "Starting camera daemon"
    );

    if let Err(e) = layout.ensure_dirs().await {
        tracing::error!(error = %e, "Cannot create storage directories");
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_listener(shutdown_tx);

    let scheduler = CaptureScheduler::new(RpicamStill::new(), &config.camera, &layout);
    let orchestrator = SyncOrchestrator::new(RcloneTransfer::new(), layout.clone(), &config.sync);
    let lifecycle = FileLifecycleManager::new(layout.clone(), &config.file_management, SysinfoDisks);

    let supervisor = Supervisor::new(
        config,
        scheduler,
        orchestrator,
        lifecycle,
        SystemClock,
        shutdown_rx,
    );

    if let Err(e) = supervisor.run().await {
        tracing::error!(error = %e, "Daemon failed");
        std::process::exit(1);
    }
}
