//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use stream_window_helper::prelude::*;
//! ```

// Core
pub use crate::core::config::{FeedConfig, SLOT_HARD_CAP};
pub use crate::core::errors::{Result, SwhError};
pub use crate::core::ring::RingBuffer;

// Window
pub use crate::window::record::{RecordRef, RowSet, StreamRecord, TxKind, TxRecord, TxStatus};
pub use crate::window::store::{LiveWindowStore, Snapshot, SnapshotOptions};

// Commit
pub use crate::commit::detail_cache::DetailCache;
pub use crate::commit::scheduler::{FrameScheduler, FrameScheduling, ManualFrameScheduler};
pub use crate::commit::store::{Commit, StreamCommitStore};

// Degradation
pub use crate::degrade::controller::{
    AdaptiveDegradationController, DegradationState, STABLE_FRAMES_TO_EXIT,
};
pub use crate::degrade::timer::{IdleTimerDriver, ManualTimerDriver, TimerDriverRef};

// Slots
pub use crate::slots::{RowSlot, SlotSet, extract_rows, project, resolve_selection_index};

// Session
pub use crate::session::{IngestOutcome, StreamSession, TelemetryReport};
