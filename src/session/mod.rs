//! Session context owning one feed pipeline end to end.
//!
//! No ambient globals: the session holds explicit instances of the window
//! stores, the commit store, the degradation controller, and the telemetry
//! trackers, and wires the data flow between them — merge, gate, commit,
//! trailing flush, emergency purge. `reset()` tears the whole pipeline back
//! to its initial state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::commit::scheduler::FrameScheduling;
use crate::commit::store::{Commit, StreamCommitStore};
use crate::core::config::FeedConfig;
use crate::degrade::controller::{AdaptiveDegradationController, DegradationState};
use crate::degrade::timer::TimerDriverRef;
use crate::slots::{self, SlotSet};
use crate::telemetry::jsonl::{EventType, JsonlFeedLogger, LogEntry, Severity};
use crate::telemetry::samples::{
    DroppedFrameStats, DroppedFrameTracker, FpsTracker, HeapSummary, HeapTracker, LongTaskSummary,
    LongTaskTracker, RollingFps,
};
use crate::window::record::{RowSet, StreamRecord};
use crate::window::store::{LiveWindowStore, SnapshotOptions, now_unix_ms};

/// Result of one ingested batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Index assigned to this batch.
    pub batch_index: u64,
    /// Whether either window's row set changed.
    pub window_changed: bool,
    /// Whether a commit was enqueued for rendering.
    pub rendered: bool,
    /// Whether a trailing flush was (re)armed for a gated batch.
    pub trailing_flush_armed: bool,
}

/// Aggregated telemetry snapshot for consumers and the simulator report.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReport {
    /// Long-task totals over the retained window.
    pub long_tasks: LongTaskSummary,
    /// Rolling frames-per-second.
    pub fps: RollingFps,
    /// Heap usage reduction.
    pub heap: HeapSummary,
    /// Over-budget frame share.
    pub dropped_frames: DroppedFrameStats,
    /// Controller state at report time.
    pub degradation: DegradationState,
    /// Batches fed into the session since the last reset.
    pub batches_ingested: u64,
    /// Batches held back by the sampling stride.
    pub batches_gated: u64,
    /// Emergency detail-cache purges fired.
    pub emergency_purges: u64,
}

/// One dashboard feed session.
pub struct StreamSession<R: StreamRecord + Send + Sync + 'static> {
    config: FeedConfig,
    primary: LiveWindowStore<R>,
    secondary: LiveWindowStore<R>,
    commits: StreamCommitStore<R>,
    controller: AdaptiveDegradationController,
    long_tasks: LongTaskTracker,
    fps: FpsTracker,
    heap: HeapTracker,
    dropped: DroppedFrameTracker,
    logger: Option<JsonlFeedLogger>,
    slot_model: Option<SlotSet<R>>,
    batch_index: u64,
    gated_batches: u64,
    purges: Arc<AtomicU64>,
}

impl<R: StreamRecord + Send + Sync + 'static> StreamSession<R> {
    /// Build a session from a config (sanitized here), a frame scheduling
    /// mode, and an optional idle-timer driver for the trailing flush.
    #[must_use]
    pub fn new(
        config: FeedConfig,
        scheduling: FrameScheduling,
        timer: Option<TimerDriverRef>,
    ) -> Self {
        let config = config.sanitized();
        let commits = StreamCommitStore::new(scheduling, config.detail.limit);
        let mut controller = AdaptiveDegradationController::from_config(&config, timer);

        // The heap breach decides; the session chooses the purge target: the
        // detail cache, since the windows are already hard-bounded.
        let purges = Arc::new(AtomicU64::new(0));
        let purge_target = commits.clone();
        let purge_count = Arc::clone(&purges);
        controller.set_purge_hook(move |_bytes| {
            purge_target.clear_details();
            purge_count.fetch_add(1, Ordering::Relaxed);
        });

        let mut logger = config
            .telemetry
            .jsonl_path
            .as_deref()
            .map(JsonlFeedLogger::new);
        if let Some(sink) = logger.as_mut() {
            sink.log(&LogEntry::new(EventType::SessionStart, Severity::Info));
        }

        Self {
            long_tasks: LongTaskTracker::new(
                config.telemetry.long_task_threshold_ms,
                config.telemetry.sample_cap,
            ),
            fps: FpsTracker::new(config.telemetry.fps_window_ms, config.telemetry.sample_cap),
            heap: HeapTracker::new(config.telemetry.sample_cap),
            dropped: DroppedFrameTracker::new(
                config.telemetry.frame_budget_ms,
                config.telemetry.sample_cap,
            ),
            primary: LiveWindowStore::new(),
            secondary: LiveWindowStore::new(),
            commits,
            controller,
            logger,
            slot_model: None,
            batch_index: 0,
            gated_batches: 0,
            purges,
            config,
        }
    }

    /// Effective (sanitized) configuration.
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Shared handle to the commit store (selection, details, version).
    #[must_use]
    pub fn commits(&self) -> StreamCommitStore<R> {
        self.commits.clone()
    }

    /// Ingest one batch pair using the wall clock.
    pub fn ingest_batch(&mut self, primary: &[R], secondary: &[R]) -> IngestOutcome {
        self.ingest_batch_at(primary, secondary, now_unix_ms())
    }

    /// Ingest one batch pair at an explicit time (deterministic tests).
    pub fn ingest_batch_at(
        &mut self,
        primary: &[R],
        secondary: &[R],
        now_unix_ms: u64,
    ) -> IngestOutcome {
        let batch_index = self.batch_index;
        self.batch_index += 1;

        let options = SnapshotOptions {
            max_items: self.config.window_cap(),
            max_age_ms: self.config.window.max_age_ms,
            now_unix_ms: Some(now_unix_ms),
        };
        let merged_primary = self.primary.snapshot(primary, &options);
        let merged_secondary = self.secondary.snapshot(secondary, &options);
        let window_changed = merged_primary.changed || merged_secondary.changed;

        if !window_changed {
            return IngestOutcome {
                batch_index,
                window_changed: false,
                rendered: false,
                trailing_flush_armed: false,
            };
        }

        if self.controller.should_render_batch(batch_index) {
            // This commit is newer than any snapshot an armed trailing flush
            // is holding; that flush must not fire and roll state back.
            self.controller.cancel_trailing_flush();
            self.commits
                .enqueue_commit(Commit::new(merged_primary.rows, merged_secondary.rows));
            return IngestOutcome {
                batch_index,
                window_changed: true,
                rendered: true,
                trailing_flush_armed: false,
            };
        }

        // Gated batch: the window store stays current, rendering waits for
        // either the next stride hit or the trailing flush.
        self.gated_batches += 1;
        let commits = self.commits.clone();
        let commit = Commit::new(merged_primary.rows, merged_secondary.rows);
        let armed = self.controller.schedule_trailing_flush(Box::new(move || {
            commits.enqueue_commit(commit);
            commits.flush();
        }));
        self.log(
            LogEntry::new(EventType::BatchGated, Severity::Info)
                .batch_index(batch_index)
                .row_count(self.primary.len()),
        );
        if armed {
            self.log(
                LogEntry::new(EventType::TrailingFlush, Severity::Info).batch_index(batch_index),
            );
        }
        IngestOutcome {
            batch_index,
            window_changed: true,
            rendered: false,
            trailing_flush_armed: armed,
        }
    }

    /// Feed one frame observation into the controller and the trackers.
    pub fn on_frame(&mut self, delta_ms: f64, now_unix_ms: u64) {
        self.fps.record_frame(now_unix_ms);
        self.dropped.record_frame(delta_ms);
        self.long_tasks.record(delta_ms);

        let was_sampling = self.controller.state().sampling_mode;
        let sampling = self.controller.record_frame_delta(delta_ms);
        if sampling != was_sampling {
            let event = if sampling {
                EventType::SamplingEnter
            } else {
                EventType::SamplingExit
            };
            let severity = if sampling {
                Severity::Warning
            } else {
                Severity::Info
            };
            let ratio = self.dropped.summary().ratio;
            let mut entry = LogEntry::new(event, severity).batch_index(self.batch_index);
            entry.dropped_ratio = Some(ratio);
            self.log(entry);
        }
    }

    /// Feed a heap usage sample; a breach purges the detail cache. Returns
    /// whether the emergency threshold was breached.
    pub fn record_heap_bytes(&mut self, used_bytes: u64) -> bool {
        self.heap.record(used_bytes);
        let breached = self.controller.record_heap_bytes(used_bytes);
        if breached {
            self.log(
                LogEntry::new(EventType::EmergencyPurge, Severity::Critical)
                    .used_bytes(used_bytes),
            );
        }
        breached
    }

    /// Project the applied primary rows onto the configured slot count,
    /// reusing the previous slot model where content is unchanged.
    pub fn project_slots(&mut self) -> SlotSet<R> {
        let rows = self.commits.primary_rows();
        let next = slots::project(&rows, self.config.slots.slot_count, self.slot_model.as_ref());
        self.slot_model = Some(next.clone());
        next
    }

    /// Absolute scrolled position of the current selection.
    #[must_use]
    pub fn selection_index(&self, visible_offset: usize) -> Option<usize> {
        let rows = self.commits.primary_rows();
        let selected = self.commits.selected_id();
        slots::resolve_selection_index(&rows, selected.as_deref(), visible_offset)
    }

    /// Applied primary rows.
    #[must_use]
    pub fn primary_rows(&self) -> RowSet<R> {
        self.commits.primary_rows()
    }

    /// Force immediate application of any pending commit.
    pub fn flush(&mut self) -> bool {
        self.commits.flush()
    }

    /// Current degradation state.
    #[must_use]
    pub fn degradation(&self) -> DegradationState {
        self.controller.state()
    }

    /// Aggregated telemetry at `now_unix_ms`.
    #[must_use]
    pub fn telemetry_report(&self, now_unix_ms: u64) -> TelemetryReport {
        TelemetryReport {
            long_tasks: self.long_tasks.summary(),
            fps: self.fps.summary(now_unix_ms),
            heap: self.heap.summary(),
            dropped_frames: self.dropped.summary(),
            degradation: self.controller.state(),
            batches_ingested: self.batch_index,
            batches_gated: self.gated_batches,
            emergency_purges: self.purges.load(Ordering::Relaxed),
        }
    }

    /// Tear the whole pipeline back to its initial state.
    pub fn reset(&mut self) {
        self.primary.reset();
        self.secondary.reset();
        self.commits.reset();
        self.controller.reset();
        self.long_tasks.clear();
        self.fps.clear();
        self.heap.clear();
        self.dropped.clear();
        self.slot_model = None;
        self.batch_index = 0;
        self.gated_batches = 0;
        self.purges.store(0, Ordering::Relaxed);
        self.log(LogEntry::new(EventType::SessionReset, Severity::Info));
    }

    fn log(&mut self, entry: LogEntry) {
        if let Some(sink) = self.logger.as_mut() {
            sink.log(&entry);
        }
    }
}
