//! picamd - unattended interval-capture camera daemon
//!
//! Periodically captures images, batches them, uploads them to remote
//! storage and retires aged data under disk-space pressure.
//!
//! ## Architecture
//!
//! 1. Config - validated, immutable snapshot of all tunables
//! 2. CaptureScheduler - periodic acquisition into the staging area
//! 3. SyncOrchestrator - batched upload, per-mode local disposition
//! 4. FileLifecycleManager - archiving, retention, space-pressure purge
//! 5. SafeModeGate - startup delay allowing operator intervention
//! 6. Supervisor - top-level run/shutdown lifecycle
//!
//! ## Design Principles
//!
//! - Single logical control loop: all directory mutation is serialized
//! - External collaborators (camera, transfer tool) sit behind traits with
//!   bounded timeouts
//! - Continued operation beats fail-fast: only startup errors are fatal

pub mod camera;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod safe_mode;
pub mod scheduler;
pub mod storage;
pub mod supervisor;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
