//! Logical clock for access-time stamping.
//!
//! The space never reads wall-clock time. The host owns a [`LogicalClock`],
//! advances it at whatever cadence makes sense (per perception cycle, per
//! maintenance tick), and shares it with the [`AtomSpace`](crate::space::AtomSpace)
//! and the maintenance runner.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically non-decreasing tick counter.
///
/// Safe to share across threads via `Arc<LogicalClock>`. The engine only ever
/// reads it; advancing is the host's job.
#[derive(Debug)]
pub struct LogicalClock {
    tick: AtomicU64,
}

impl LogicalClock {
    /// Create a clock starting at tick 0.
    pub fn new() -> Self {
        Self {
            tick: AtomicU64::new(0),
        }
    }

    /// Create a clock resuming from a given tick.
    pub fn starting_from(tick: u64) -> Self {
        Self {
            tick: AtomicU64::new(tick),
        }
    }

    /// Current tick.
    pub fn now(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Advance the clock by one tick, returning the new value.
    pub fn advance(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}
