//! Configuration system: TOML file + env var overrides + defensive clamping.
//!
//! Unlike a validating config that rejects bad values, this one *sanitizes*:
//! every numeric knob has a documented range and a fallback default, and
//! out-of-range or non-finite input is clamped or replaced rather than
//! reported. Only unparseable TOML/env text is an error.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SwhError};

/// Hard cap on the virtualized slot model, independent of configuration.
pub const SLOT_HARD_CAP: usize = 50;

/// Full feed configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct FeedConfig {
    pub window: WindowConfig,
    pub sampling: SamplingConfig,
    pub heap: HeapConfig,
    pub detail: DetailConfig,
    pub slots: SlotConfig,
    pub telemetry: TelemetryConfig,
}

/// Live window store bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Maximum records retained per feed. Values at or below zero yield an
    /// empty window and clear prior state.
    pub max_items: i64,
    /// Optional age cutoff; records observed more than this many ms before
    /// "now" are excluded. `None` disables the age window.
    pub max_age_ms: Option<u64>,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_items: 120,
            max_age_ms: None,
        }
    }
}

/// Degradation controller knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    /// Frame delta above which sampling mode engages. Range [16, 120] ms.
    pub lag_threshold_ms: f64,
    /// Render every Nth batch while sampling. Range [1, 20].
    pub stride: u32,
    /// Trailing flush debounce delay. Range [100, 2000] ms.
    pub flush_idle_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            lag_threshold_ms: 30.0,
            stride: 5,
            flush_idle_ms: 500,
        }
    }
}

/// Heap pressure thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeapConfig {
    /// Used-heap level that fires the emergency purge hook. Range [128, 1024] MB.
    pub emergency_purge_mb: u64,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            emergency_purge_mb: 400,
        }
    }
}

/// Detail cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DetailConfig {
    /// Maximum cached detail payloads; oldest-inserted evicted past this.
    pub limit: usize,
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self { limit: 96 }
    }
}

/// Virtualized slot model bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SlotConfig {
    /// Display slots to project; clamped to the hard cap of 50.
    pub slot_count: usize,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self { slot_count: 25 }
    }
}

/// Telemetry tracker bounds and the optional JSONL sink path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Sample window capacity shared by the bounded trackers.
    pub sample_cap: usize,
    /// Frame budget used by the dropped-frame ratio. Range [8, 100] ms.
    pub frame_budget_ms: f64,
    /// Duration above which a frame counts as a long task. Range [16, 500] ms.
    pub long_task_threshold_ms: f64,
    /// Rolling window for the fps reduction. Range [250, 10000] ms.
    pub fps_window_ms: u64,
    /// JSONL event log path; `None` disables the sink.
    pub jsonl_path: Option<std::path::PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_cap: 120,
            frame_budget_ms: 16.7,
            long_task_threshold_ms: 50.0,
            fps_window_ms: 1000,
            jsonl_path: None,
        }
    }
}

impl FeedConfig {
    /// Load from a TOML file, apply env overrides, then sanitize.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SwhError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| SwhError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: Self = toml::from_str(&raw).map_err(|e| SwhError::ConfigParse {
            context: "toml",
            details: e.to_string(),
        })?;
        cfg.apply_env_overrides()?;
        Ok(cfg.sanitized())
    }

    /// Defaults + env overrides + sanitize, without touching the filesystem.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides()?;
        Ok(cfg.sanitized())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SwhError::Serialization {
            context: "config",
            details: e.to_string(),
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(raw) = lookup("SWH_WINDOW_MAX_ITEMS") {
            self.window.max_items = parse_env_num("SWH_WINDOW_MAX_ITEMS", &raw)?;
        }
        if let Some(raw) = lookup("SWH_WINDOW_MAX_AGE_MS") {
            self.window.max_age_ms = Some(parse_env_num("SWH_WINDOW_MAX_AGE_MS", &raw)?);
        }
        if let Some(raw) = lookup("SWH_SAMPLING_LAG_THRESHOLD_MS") {
            self.sampling.lag_threshold_ms = parse_env_num("SWH_SAMPLING_LAG_THRESHOLD_MS", &raw)?;
        }
        if let Some(raw) = lookup("SWH_SAMPLING_STRIDE") {
            self.sampling.stride = parse_env_num("SWH_SAMPLING_STRIDE", &raw)?;
        }
        if let Some(raw) = lookup("SWH_SAMPLING_FLUSH_IDLE_MS") {
            self.sampling.flush_idle_ms = parse_env_num("SWH_SAMPLING_FLUSH_IDLE_MS", &raw)?;
        }
        if let Some(raw) = lookup("SWH_HEAP_EMERGENCY_PURGE_MB") {
            self.heap.emergency_purge_mb = parse_env_num("SWH_HEAP_EMERGENCY_PURGE_MB", &raw)?;
        }
        if let Some(raw) = lookup("SWH_DETAIL_LIMIT") {
            self.detail.limit = parse_env_num("SWH_DETAIL_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("SWH_SLOT_COUNT") {
            self.slots.slot_count = parse_env_num("SWH_SLOT_COUNT", &raw)?;
        }
        if let Some(raw) = lookup("SWH_TELEMETRY_JSONL_PATH") {
            self.telemetry.jsonl_path = Some(raw.into());
        }
        Ok(())
    }

    /// Clamp every knob into its documented range; replace non-finite floats
    /// with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        self.window.max_items = self.window.max_items.max(0);

        self.sampling.lag_threshold_ms =
            clamp_finite(self.sampling.lag_threshold_ms, 16.0, 120.0, defaults.sampling.lag_threshold_ms);
        self.sampling.stride = self.sampling.stride.clamp(1, 20);
        self.sampling.flush_idle_ms = self.sampling.flush_idle_ms.clamp(100, 2000);

        self.heap.emergency_purge_mb = self.heap.emergency_purge_mb.clamp(128, 1024);

        self.detail.limit = self.detail.limit.max(1);
        self.slots.slot_count = self.slots.slot_count.min(SLOT_HARD_CAP);

        self.telemetry.sample_cap = self.telemetry.sample_cap.clamp(8, 4096);
        self.telemetry.frame_budget_ms =
            clamp_finite(self.telemetry.frame_budget_ms, 8.0, 100.0, defaults.telemetry.frame_budget_ms);
        self.telemetry.long_task_threshold_ms = clamp_finite(
            self.telemetry.long_task_threshold_ms,
            16.0,
            500.0,
            defaults.telemetry.long_task_threshold_ms,
        );
        self.telemetry.fps_window_ms = self.telemetry.fps_window_ms.clamp(250, 10_000);

        self
    }

    /// Window store cap as the non-negative count the merge uses.
    #[must_use]
    pub fn window_cap(&self) -> usize {
        usize::try_from(self.window.max_items.max(0)).unwrap_or(0)
    }

    /// Heap emergency threshold in bytes.
    #[must_use]
    pub const fn heap_emergency_purge_bytes(&self) -> u64 {
        self.heap.emergency_purge_mb * 1024 * 1024
    }
}

fn clamp_finite(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn lookup(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_num<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| SwhError::ConfigParse {
        context: "env",
        details: format!("{name} is not a valid number: {raw:?}"),
    })
}
