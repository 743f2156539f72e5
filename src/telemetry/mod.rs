//! Telemetry: bounded sample reductions for degradation decisions and the
//! append-only JSONL session event sink.

pub mod jsonl;
pub mod samples;

pub use jsonl::{EventType, JsonlFeedLogger, LogEntry, Severity};
pub use samples::{
    DroppedFrameStats, DroppedFrameTracker, FpsTracker, HeapSummary, HeapTracker, LongTaskSummary,
    LongTaskTracker, RollingFps,
};
