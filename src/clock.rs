//! Clock seam
//!
//! The scheduler and lifecycle manager take explicit timestamps, so the
//! supervisor injects a clock instead of calling `Utc::now()` inline. Tests
//! drive time without real delays.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
