//! Bounded telemetry reductions over frame and heap samples.
//!
//! Every tracker keeps a RingBuffer-bounded sample window and exposes a pure
//! summary over it: long-task totals, rolling fps, heap usage, and the
//! dropped-frame ratio. Summaries are plain serde structs — the degradation
//! controller and the JSONL sink both consume them, nothing here mutates
//! anything outside its own window.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

use crate::core::ring::RingBuffer;

/// Totals over frame work that exceeded the long-task threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LongTaskSummary {
    /// Retained breaches.
    pub count: usize,
    /// Sum of breaching durations.
    pub total_ms: f64,
    /// Worst retained breach.
    pub max_ms: f64,
    /// Threshold the tracker filters against.
    pub threshold_ms: f64,
}

/// Records durations and retains only those above the threshold.
#[derive(Debug, Clone)]
pub struct LongTaskTracker {
    threshold_ms: f64,
    breaches: RingBuffer<f64>,
}

impl LongTaskTracker {
    #[must_use]
    pub fn new(threshold_ms: f64, sample_cap: usize) -> Self {
        Self {
            threshold_ms,
            breaches: RingBuffer::new(sample_cap),
        }
    }

    /// Record one task duration; ignored unless it breaches the threshold.
    pub fn record(&mut self, duration_ms: f64) {
        if duration_ms.is_finite() && duration_ms > self.threshold_ms {
            self.breaches.push(duration_ms);
        }
    }

    #[must_use]
    pub fn summary(&self) -> LongTaskSummary {
        LongTaskSummary {
            count: self.breaches.len(),
            total_ms: self.breaches.iter().sum(),
            max_ms: self.breaches.iter().copied().fold(0.0, f64::max),
            threshold_ms: self.threshold_ms,
        }
    }

    pub fn clear(&mut self) {
        self.breaches.clear();
    }
}

/// Rolling frames-per-second over a fixed wall-clock window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingFps {
    /// Frames per second over the window.
    pub fps: f64,
    /// Frames observed inside the window.
    pub frame_count: usize,
    /// Window length.
    pub window_ms: u64,
}

/// Frame timestamp window for the fps reduction.
#[derive(Debug, Clone)]
pub struct FpsTracker {
    window_ms: u64,
    frames: RingBuffer<u64>,
}

impl FpsTracker {
    #[must_use]
    pub fn new(window_ms: u64, sample_cap: usize) -> Self {
        Self {
            window_ms,
            frames: RingBuffer::new(sample_cap),
        }
    }

    /// Record one presented frame at `now_unix_ms`.
    pub fn record_frame(&mut self, now_unix_ms: u64) {
        self.frames.push(now_unix_ms);
    }

    /// Frames inside `[now - window, now]`, scaled to per-second.
    #[must_use]
    pub fn summary(&self, now_unix_ms: u64) -> RollingFps {
        let cutoff = now_unix_ms.saturating_sub(self.window_ms);
        let frame_count = self.frames.iter().filter(|&&at| at >= cutoff).count();
        RollingFps {
            fps: frame_count as f64 * 1000.0 / self.window_ms as f64,
            frame_count,
            window_ms: self.window_ms,
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Heap usage reduction over the retained sample window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeapSummary {
    /// Retained samples.
    pub sample_count: usize,
    /// Most recent sample.
    pub latest_bytes: u64,
    /// Highest retained sample.
    pub peak_bytes: u64,
    /// Mean over the retained window.
    pub average_bytes: u64,
    /// Latest minus oldest retained sample; negative when shrinking.
    pub delta_bytes: i64,
}

/// Bounded heap sample window.
#[derive(Debug, Clone)]
pub struct HeapTracker {
    samples: RingBuffer<u64>,
}

impl HeapTracker {
    #[must_use]
    pub fn new(sample_cap: usize) -> Self {
        Self {
            samples: RingBuffer::new(sample_cap),
        }
    }

    pub fn record(&mut self, used_bytes: u64) {
        self.samples.push(used_bytes);
    }

    #[must_use]
    pub fn summary(&self) -> HeapSummary {
        let sample_count = self.samples.len();
        let latest = self.samples.latest().copied().unwrap_or(0);
        let oldest = self.samples.oldest().copied().unwrap_or(0);
        let sum: u128 = self.samples.iter().map(|&b| u128::from(b)).sum();
        let average = if sample_count == 0 {
            0
        } else {
            u64::try_from(sum / sample_count as u128).unwrap_or(u64::MAX)
        };
        HeapSummary {
            sample_count,
            latest_bytes: latest,
            peak_bytes: self.samples.iter().copied().max().unwrap_or(0),
            average_bytes: average,
            delta_bytes: i64::try_from(i128::from(latest) - i128::from(oldest))
                .unwrap_or(i64::MAX),
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Share of frames that blew the frame budget, over the retained window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DroppedFrameStats {
    /// Frames in the retained window.
    pub total_frames: usize,
    /// Frames over budget.
    pub dropped_frames: usize,
    /// `dropped_frames / total_frames`, zero on an empty window.
    pub ratio: f64,
    /// Budget the deltas are judged against.
    pub frame_budget_ms: f64,
}

/// Bounded frame-delta window for the dropped-frame reduction.
#[derive(Debug, Clone)]
pub struct DroppedFrameTracker {
    frame_budget_ms: f64,
    deltas: RingBuffer<f64>,
}

impl DroppedFrameTracker {
    #[must_use]
    pub fn new(frame_budget_ms: f64, sample_cap: usize) -> Self {
        Self {
            frame_budget_ms,
            deltas: RingBuffer::new(sample_cap),
        }
    }

    pub fn record_frame(&mut self, delta_ms: f64) {
        if delta_ms.is_finite() {
            self.deltas.push(delta_ms);
        }
    }

    #[must_use]
    pub fn summary(&self) -> DroppedFrameStats {
        let total_frames = self.deltas.len();
        let dropped_frames = self
            .deltas
            .iter()
            .filter(|&&delta| delta > self.frame_budget_ms)
            .count();
        let ratio = if total_frames == 0 {
            0.0
        } else {
            dropped_frames as f64 / total_frames as f64
        };
        DroppedFrameStats {
            total_frames,
            dropped_frames,
            ratio,
            frame_budget_ms: self.frame_budget_ms,
        }
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{DroppedFrameTracker, FpsTracker, HeapTracker, LongTaskTracker};

    #[test]
    fn long_tasks_count_only_breaches() {
        let mut tracker = LongTaskTracker::new(50.0, 16);
        tracker.record(10.0);
        tracker.record(80.0);
        tracker.record(60.0);
        tracker.record(f64::NAN);
        let summary = tracker.summary();
        assert_eq!(summary.count, 2);
        assert!((summary.total_ms - 140.0).abs() < 1e-9);
        assert!((summary.max_ms - 80.0).abs() < 1e-9);
        assert!((summary.threshold_ms - 50.0).abs() < 1e-9);
    }

    #[test]
    fn fps_counts_frames_inside_the_window() {
        let mut tracker = FpsTracker::new(1000, 256);
        for at in [100u64, 200, 900, 1500, 1900] {
            tracker.record_frame(at);
        }
        let summary = tracker.summary(1900);
        // 900, 1500, 1900 are within [900, 1900].
        assert_eq!(summary.frame_count, 3);
        assert!((summary.fps - 3.0).abs() < 1e-9);
    }

    #[test]
    fn heap_summary_tracks_peak_and_delta() {
        let mut tracker = HeapTracker::new(8);
        tracker.record(100);
        tracker.record(400);
        tracker.record(250);
        let summary = tracker.summary();
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.latest_bytes, 250);
        assert_eq!(summary.peak_bytes, 400);
        assert_eq!(summary.average_bytes, 250);
        assert_eq!(summary.delta_bytes, 150);
    }

    #[test]
    fn heap_summary_on_empty_window_is_zeroed() {
        let tracker = HeapTracker::new(8);
        let summary = tracker.summary();
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.delta_bytes, 0);
    }

    #[test]
    fn dropped_ratio_over_bounded_window() {
        let mut tracker = DroppedFrameTracker::new(16.7, 4);
        for delta in [10.0, 20.0, 30.0, 12.0, 40.0] {
            tracker.record_frame(delta);
        }
        // Capacity 4: the 10.0 sample aged out.
        let summary = tracker.summary();
        assert_eq!(summary.total_frames, 4);
        assert_eq!(summary.dropped_frames, 3);
        assert!((summary.ratio - 0.75).abs() < 1e-9);
    }
}
