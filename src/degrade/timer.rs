//! Injectable idle-timer capability used by the trailing flush debounce.
//!
//! Mirrors the frame scheduler contract: arm/cancel, idempotent cancel, and a
//! manually driven implementation for deterministic tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// Callback invoked when an idle timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Opaque token identifying one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Capability contract for one-shot idle timers.
///
/// Cancelling an unknown or already-fired handle is a no-op.
pub trait IdleTimerDriver: Send + Sync {
    /// Arm a one-shot timer.
    fn arm(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;
    /// Disarm a pending timer if it has not fired yet.
    fn cancel(&self, handle: TimerHandle);
}

/// Manually driven timer driver for tests and the simulator.
#[derive(Default)]
pub struct ManualTimerDriver {
    armed: Mutex<Vec<(TimerHandle, Duration, TimerCallback)>>,
    next_handle: AtomicU64,
}

impl ManualTimerDriver {
    /// Empty driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of timers currently armed.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }

    /// Delay of the most recently armed timer, if any.
    #[must_use]
    pub fn last_delay(&self) -> Option<Duration> {
        self.armed.lock().last().map(|(_, delay, _)| *delay)
    }

    /// Fire the oldest armed timer. Returns whether one fired.
    pub fn fire_next(&self) -> bool {
        let entry = {
            let mut armed = self.armed.lock();
            if armed.is_empty() {
                None
            } else {
                Some(armed.remove(0))
            }
        };
        match entry {
            Some((_, _, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Fire every armed timer in arming order. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let mut fired = 0;
        while self.fire_next() {
            fired += 1;
        }
        fired
    }
}

impl IdleTimerDriver for ManualTimerDriver {
    fn arm(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.armed.lock().push((handle, delay, callback));
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.armed.lock().retain(|(h, _, _)| *h != handle);
    }
}

/// Shared driver handle type used across the crate.
pub type TimerDriverRef = Arc<dyn IdleTimerDriver>;
