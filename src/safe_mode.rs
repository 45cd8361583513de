//! Safe-mode gate - startup delay state machine
//!
//! ## Responsibilities
//!
//! - Hold the daemon at startup for `delay_secs` so an operator can
//!   intervene before the capture loop begins
//! - Abort immediately on an interrupt/termination signal
//!
//! Three-state machine: Idle -> Counting(remaining) -> Released | Aborted.
//! The 1-second countdown sleep races the shutdown channel in a `select!`,
//! so a signal is observed at sub-second latency rather than at the next
//! whole-second boundary. The gate runs exactly once per process lifetime.

use crate::config::SafeModeConfig;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Counting { remaining: u64 },
    /// Countdown completed (or safe mode disabled); startup proceeds
    Released,
    /// Signal received during countdown; the process must exit
    Aborted,
}

/// Safe-mode gate instance
pub struct SafeModeGate {
    config: SafeModeConfig,
}

impl SafeModeGate {
    pub fn new(config: &SafeModeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run the gate to completion. Returns `Released` or `Aborted`.
    pub async fn run(&self, shutdown: &mut watch::Receiver<bool>) -> GateState {
        if !self.config.enabled {
            return GateState::Released;
        }
        if *shutdown.borrow() {
            return GateState::Aborted;
        }

        warn!(
            delay_secs = self.config.delay_secs,
            "{}", self.config.message
        );
        let mut state = GateState::Counting {
            remaining: self.config.delay_secs,
        };

        // If the signal task ever goes away, keep counting without it
        let mut watch_alive = true;

        while let GateState::Counting { remaining } = state {
            if remaining == 0 {
                state = GateState::Released;
                break;
            }
            if remaining % 30 == 0 || remaining <= 10 {
                info!(remaining_secs = remaining, "Safe mode countdown");
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    state = GateState::Counting { remaining: remaining - 1 };
                }
                changed = shutdown.changed(), if watch_alive => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            warn!("Signal received during safe mode, aborting startup");
                            return GateState::Aborted;
                        }
                        Ok(()) => {}
                        Err(_) => watch_alive = false,
                    }
                }
            }
        }

        info!("Safe mode released, starting normal operation");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(enabled: bool, delay_secs: u64) -> SafeModeGate {
        SafeModeGate::new(&SafeModeConfig {
            enabled,
            delay_secs,
            message: "test safe mode".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_gate_releases_with_zero_delay() {
        let (_tx, mut rx) = watch::channel(false);
        let start = tokio::time::Instant::now();

        let state = gate(false, 9999).run(&mut rx).await;

        assert_eq!(state, GateState::Released);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn full_countdown_releases_at_delay() {
        let (_tx, mut rx) = watch::channel(false);
        let start = tokio::time::Instant::now();

        let state = gate(true, 180).run(&mut rx).await;

        assert_eq!(state, GateState::Released);
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn signal_during_countdown_aborts_promptly() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });

        let start = tokio::time::Instant::now();
        let state = gate(true, 180).run(&mut rx).await;

        assert_eq!(state, GateState::Aborted);
        // Observed well before the 180s release point
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn signal_before_gate_aborts_immediately() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        let state = gate(true, 180).run(&mut rx).await;
        assert_eq!(state, GateState::Aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_enabled_gate_releases_immediately() {
        let (_tx, mut rx) = watch::channel(false);
        let state = gate(true, 0).run(&mut rx).await;
        assert_eq!(state, GateState::Released);
    }
}
