//! Backpressure decisions: sampling-mode state machine and the injectable
//! idle timer it debounces trailing flushes with.

pub mod controller;
pub mod timer;

pub use controller::{
    AdaptiveDegradationController, DegradationState, PurgeHook, STABLE_FRAMES_TO_EXIT,
};
pub use timer::{IdleTimerDriver, ManualTimerDriver, TimerCallback, TimerDriverRef, TimerHandle};
