//! Periodic maintenance: the forgetting loop.
//!
//! The space itself stays scheduler-agnostic — it only exposes
//! [`AtomSpace::eviction_sweep`](crate::space::AtomSpace::eviction_sweep).
//! [`Maintenance`] is the externally-owned driver: the host constructs it,
//! decides the cadence, and stops it. Sweep self-exclusion lives inside the
//! space, so an overlapping manual sweep and timer sweep cannot collide.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::space::{AtomSpace, SweepReport};

/// Externally-owned driver for periodic eviction sweeps.
pub struct Maintenance {
    space: Arc<AtomSpace>,
    interval: Duration,
    advance_clock: bool,
}

impl Maintenance {
    /// Create a driver sweeping at the given interval.
    pub fn new(space: Arc<AtomSpace>, interval: Duration) -> Self {
        Self {
            space,
            interval,
            advance_clock: true,
        }
    }

    /// Whether each tick advances the space's logical clock (default: true).
    /// Hosts that drive the clock themselves turn this off.
    pub fn advance_clock(mut self, advance: bool) -> Self {
        self.advance_clock = advance;
        self
    }

    /// Run one maintenance tick synchronously.
    pub fn run_once(&self) -> SweepReport {
        let now = if self.advance_clock {
            self.space.clock().advance()
        } else {
            self.space.clock().now()
        };
        self.space.eviction_sweep(now)
    }

    /// Start a dedicated sweep thread. The returned handle stops it.
    pub fn spawn(self) -> MaintenanceHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let interval = self.interval;

        let join = std::thread::Builder::new()
            .name("heka-maintenance".into())
            .spawn(move || {
                tracing::debug!(interval_ms = interval.as_millis() as u64, "maintenance started");
                while !stop_flag.load(Ordering::Acquire) {
                    std::thread::sleep(interval);
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    self.run_once();
                }
                tracing::debug!("maintenance stopped");
            })
            .expect("failed to spawn maintenance thread");

        MaintenanceHandle {
            stop,
            join: Some(join),
        }
    }
}

/// Handle to a running maintenance thread.
pub struct MaintenanceHandle {
    stop: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Signal the thread to stop and wait for it to finish its current sweep.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
