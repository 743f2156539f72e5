//! Adaptive degradation controller: sampling-mode backpressure with
//! hysteresis, a trailing-flush debounce, and an emergency heap-purge signal.
//!
//! Two states: **normal** and **sampling**. One over-threshold frame delta
//! enters sampling; leaving requires a full streak of consecutive stable
//! frames so a single good frame inside a burst does not flap the mode.
//! The controller only decides — rendering gates and purge targets are the
//! caller's business.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::config::FeedConfig;
use crate::degrade::timer::{TimerCallback, TimerDriverRef, TimerHandle};

/// Consecutive at-or-below-threshold frames required to leave sampling mode.
pub const STABLE_FRAMES_TO_EXIT: u32 = 5;

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DegradationState {
    /// Whether reduced-fidelity rendering is active.
    pub sampling_mode: bool,
    /// Current streak of stable frames while in sampling mode.
    pub stable_frame_count: u32,
    /// Whether a trailing flush timer is armed.
    pub trailing_flush_scheduled: bool,
}

/// Hook invoked synchronously when heap usage breaches the emergency level.
pub type PurgeHook = Box<dyn FnMut(u64) + Send>;

/// Frame-budget/heap-pressure state machine.
pub struct AdaptiveDegradationController {
    lag_threshold_ms: f64,
    stride: u32,
    flush_idle: Duration,
    heap_purge_bytes: u64,
    sampling: bool,
    stable_frames: u32,
    timer: Option<TimerDriverRef>,
    /// Shared with the armed callback so a fired flush clears its own slot.
    flush_timer: Arc<Mutex<Option<TimerHandle>>>,
    purge_hook: Option<PurgeHook>,
}

impl AdaptiveDegradationController {
    /// Controller from a config, with an optional timer driver for the
    /// trailing flush. Without a driver the trailing flush degrades to a
    /// no-op rather than failing. The stride is clamped to at least 1 even
    /// when the config was not sanitized.
    #[must_use]
    pub fn from_config(config: &FeedConfig, timer: Option<TimerDriverRef>) -> Self {
        Self {
            lag_threshold_ms: config.sampling.lag_threshold_ms,
            stride: config.sampling.stride.max(1),
            flush_idle: Duration::from_millis(config.sampling.flush_idle_ms),
            heap_purge_bytes: config.heap_emergency_purge_bytes(),
            sampling: false,
            stable_frames: 0,
            timer,
            flush_timer: Arc::new(Mutex::new(None)),
            purge_hook: None,
        }
    }

    /// Register the emergency purge hook. Fires synchronously from within
    /// [`Self::record_heap_bytes`], once per breaching call.
    pub fn set_purge_hook(&mut self, hook: impl FnMut(u64) + Send + 'static) {
        self.purge_hook = Some(Box::new(hook));
    }

    /// Feed one frame delta. Returns whether sampling mode is active after
    /// the call. Non-finite deltas carry no timing information and are
    /// ignored.
    pub fn record_frame_delta(&mut self, delta_ms: f64) -> bool {
        if !delta_ms.is_finite() {
            return self.sampling;
        }
        if delta_ms > self.lag_threshold_ms {
            self.sampling = true;
            self.stable_frames = 0;
        } else if self.sampling {
            self.stable_frames += 1;
            if self.stable_frames >= STABLE_FRAMES_TO_EXIT {
                self.exit_sampling();
            }
        }
        self.sampling
    }

    /// Whether batch `batch_index` should render. Always true in normal
    /// mode; every `stride`th batch while sampling.
    #[must_use]
    pub fn should_render_batch(&self, batch_index: u64) -> bool {
        !self.sampling || batch_index % u64::from(self.stride) == 0
    }

    /// (Re)arm the trailing flush while sampling: debounce semantics, the
    /// newest arm wins. Returns whether a timer was armed.
    pub fn schedule_trailing_flush(&mut self, flush: TimerCallback) -> bool {
        if !self.sampling {
            return false;
        }
        let Some(driver) = &self.timer else {
            return false;
        };
        let mut slot = self.flush_timer.lock();
        if let Some(previous) = slot.take() {
            driver.cancel(previous);
        }
        let shared = Arc::clone(&self.flush_timer);
        *slot = Some(driver.arm(
            self.flush_idle,
            Box::new(move || {
                *shared.lock() = None;
                flush();
            }),
        ));
        true
    }

    /// Disarm any pending trailing flush. Called when a newer commit renders:
    /// the armed snapshot is older than the applied state and must not fire.
    pub fn cancel_trailing_flush(&mut self) {
        if let Some(handle) = self.flush_timer.lock().take()
            && let Some(driver) = &self.timer
        {
            driver.cancel(handle);
        }
    }

    /// Feed a heap usage sample. A breach fires the purge hook synchronously
    /// and returns true — once per breaching call, no internal debounce.
    pub fn record_heap_bytes(&mut self, used_bytes: u64) -> bool {
        if used_bytes <= self.heap_purge_bytes {
            return false;
        }
        if let Some(hook) = &mut self.purge_hook {
            hook(used_bytes);
        }
        true
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> DegradationState {
        DegradationState {
            sampling_mode: self.sampling,
            stable_frame_count: self.stable_frames,
            trailing_flush_scheduled: self.flush_timer.lock().is_some(),
        }
    }

    /// Back to normal mode with no armed timer.
    pub fn reset(&mut self) {
        self.exit_sampling();
    }

    fn exit_sampling(&mut self) {
        self.sampling = false;
        self.stable_frames = 0;
        self.cancel_trailing_flush();
    }
}
