//! Injectable next-frame scheduler capability.
//!
//! The commit store never talks to a display loop directly; it asks a
//! [`FrameScheduler`] for "one callback on the next refresh" and keeps at
//! most one outstanding request. Production wires a real refresh source,
//! tests drive [`ManualFrameScheduler`] by hand, and the named
//! [`FrameScheduling::Immediate`] mode applies synchronously when no
//! scheduler exists at all.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Callback invoked on the next display refresh.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Opaque token identifying one scheduled frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Capability contract for next-frame scheduling.
///
/// `cancel` must be idempotent: cancelling an unknown or already-fired
/// handle is a no-op, never an error.
pub trait FrameScheduler: Send + Sync {
    /// Request `callback` to run on the next display refresh.
    fn schedule(&self, callback: FrameCallback) -> FrameHandle;
    /// Drop a pending request if it has not fired yet.
    fn cancel(&self, handle: FrameHandle);
}

/// How a commit store applies pending commits.
#[derive(Clone)]
pub enum FrameScheduling {
    /// Defer to an injected scheduler; one callback per refresh.
    Driver(Arc<dyn FrameScheduler>),
    /// No scheduler available: apply synchronously inside `enqueue`.
    Immediate,
}

impl std::fmt::Debug for FrameScheduling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver(_) => f.write_str("FrameScheduling::Driver"),
            Self::Immediate => f.write_str("FrameScheduling::Immediate"),
        }
    }
}

/// Manually driven scheduler for deterministic tests and the simulator.
///
/// Scheduled callbacks queue up until [`Self::fire_next`] or
/// [`Self::fire_all`] is called.
#[derive(Default)]
pub struct ManualFrameScheduler {
    queue: Mutex<VecDeque<(FrameHandle, FrameCallback)>>,
    next_handle: AtomicU64,
}

impl ManualFrameScheduler {
    /// Empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Fire the oldest pending callback. Returns whether one fired.
    pub fn fire_next(&self) -> bool {
        let entry = self.queue.lock().pop_front();
        match entry {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Fire every pending callback in order. Returns how many fired.
    pub fn fire_all(&self) -> usize {
        let mut fired = 0;
        while self.fire_next() {
            fired += 1;
        }
        fired
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn schedule(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.queue.lock().push_back((handle, callback));
        handle
    }

    fn cancel(&self, handle: FrameHandle) {
        self.queue.lock().retain(|(h, _)| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{FrameScheduler, ManualFrameScheduler};

    #[test]
    fn fires_in_schedule_order() {
        let scheduler = ManualFrameScheduler::new();
        let log = Arc::new(AtomicUsize::new(0));
        for expect in 0..3 {
            let log = Arc::clone(&log);
            scheduler.schedule(Box::new(move || {
                assert_eq!(log.fetch_add(1, Ordering::SeqCst), expect);
            }));
        }
        assert_eq!(scheduler.pending(), 3);
        assert_eq!(scheduler.fire_all(), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let scheduler = ManualFrameScheduler::new();
        let handle = scheduler.schedule(Box::new(|| panic!("must not fire")));
        scheduler.cancel(handle);
        scheduler.cancel(handle);
        assert!(!scheduler.fire_next());
    }
}
