//! JSONL feed logger: append-only line-delimited JSON session events.
//!
//! Each line is a self-contained JSON object, assembled in memory and written
//! with a single `write_all` so a tailing process never sees a partial line.
//! Logging must never take a session down: on the first write failure the
//! logger degrades to silent discard.

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Session lifecycle and degradation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionReset,
    SamplingEnter,
    SamplingExit,
    BatchGated,
    TrailingFlush,
    EmergencyPurge,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`,
/// `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Batch index at event time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_index: Option<u64>,
    /// Retained primary row count at event time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Heap usage at event time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_bytes: Option<u64>,
    /// Dropped-frame ratio at event time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped_ratio: Option<f64>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            event,
            severity,
            batch_index: None,
            row_count: None,
            used_bytes: None,
            dropped_ratio: None,
            details: None,
        }
    }

    #[must_use]
    pub const fn batch_index(mut self, index: u64) -> Self {
        self.batch_index = Some(index);
        self
    }

    #[must_use]
    pub const fn row_count(mut self, count: usize) -> Self {
        self.row_count = Some(count);
        self
    }

    #[must_use]
    pub const fn used_bytes(mut self, bytes: u64) -> Self {
        self.used_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the configured path.
    Normal,
    /// A write failed; discard everything from here on.
    Disabled,
}

/// Append-only JSONL sink for session events.
pub struct JsonlFeedLogger {
    path: PathBuf,
    file: Option<File>,
    state: WriterState,
}

impl JsonlFeedLogger {
    /// Logger appending to `path`; the file is opened lazily on first write.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
            state: WriterState::Normal,
        }
    }

    /// Whether the sink is still writing (false after a write failure).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, WriterState::Normal)
    }

    /// Append one entry. Infallible by contract: failures disable the sink.
    pub fn log(&mut self, entry: &LogEntry) {
        if self.state == WriterState::Disabled {
            return;
        }
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');
        if self.write_line(line.as_bytes()).is_err() {
            self.file = None;
            self.state = WriterState::Disabled;
        }
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line)?;
            file.flush()?;
        }
        Ok(())
    }
}
