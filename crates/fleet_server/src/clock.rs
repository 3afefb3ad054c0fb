//! Wall-clock abstraction.
//!
//! Everything in the scheduler and service reads time through [`Clock`] so
//! tests can drive ticks with a controlled timeline. Production uses
//! [`SystemClock`]; millisecond epoch timestamps match the serialized
//! vehicle state.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}
