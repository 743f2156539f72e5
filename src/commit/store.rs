//! Frame-synchronized commit store.
//!
//! Decouples high-frequency upstream commits from the display refresh rate:
//! bursts coalesce into the latest pending commit, at most one frame callback
//! is outstanding at a time, and state is written only when rows or selection
//! actually changed by reference. Owns the bounded per-record detail cache
//! and the version counter consumers use to invalidate memoized detail views.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::commit::detail_cache::DetailCache;
use crate::commit::scheduler::{FrameHandle, FrameScheduling};
use crate::window::record::{RowSet, StreamRecord, empty_rows};

/// One upstream update destined for frame-batched application.
///
/// Immutable once enqueued; enqueueing a newer commit replaces the pending
/// one rather than queueing behind it.
#[derive(Debug, Clone)]
pub struct Commit<R> {
    /// Main feed rows in display order.
    pub primary_rows: RowSet<R>,
    /// Companion feed rows in display order.
    pub secondary_rows: RowSet<R>,
}

impl<R> Commit<R> {
    /// Commit from already-shared row sets.
    #[must_use]
    pub fn new(primary_rows: RowSet<R>, secondary_rows: RowSet<R>) -> Self {
        Self {
            primary_rows,
            secondary_rows,
        }
    }

    /// Commit with only a primary feed.
    #[must_use]
    pub fn primary_only(primary_rows: RowSet<R>) -> Self {
        Self {
            primary_rows,
            secondary_rows: empty_rows(),
        }
    }
}

struct Inner<R> {
    scheduling: FrameScheduling,
    detail_limit: usize,
    primary: RowSet<R>,
    secondary: RowSet<R>,
    selected_id: Option<String>,
    version: u64,
    pending: Option<Commit<R>>,
    frame: Option<FrameHandle>,
    details: DetailCache<Value>,
}

/// Commit/batching layer for one feed session. Cheap to clone; clones share
/// state, which is how the scheduled frame callback re-enters the store.
pub struct StreamCommitStore<R> {
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R> Clone for StreamCommitStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: StreamRecord + Send + Sync + 'static> StreamCommitStore<R> {
    /// New store with the given scheduling mode and detail cache limit.
    #[must_use]
    pub fn new(scheduling: FrameScheduling, detail_limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                scheduling,
                detail_limit: detail_limit.max(1),
                primary: empty_rows(),
                secondary: empty_rows(),
                selected_id: None,
                version: 0,
                pending: None,
                frame: None,
                details: DetailCache::new(),
            })),
        }
    }

    /// Store the commit as the pending value and ensure exactly one apply is
    /// scheduled. A burst of enqueues before the next frame keeps only the
    /// latest commit; intermediate ones are dropped, not queued.
    pub fn enqueue_commit(&self, commit: Commit<R>) {
        let mut inner = self.inner.lock();
        inner.pending = Some(commit);
        if inner.frame.is_some() {
            return;
        }
        match inner.scheduling.clone() {
            FrameScheduling::Driver(driver) => {
                let shared = Arc::downgrade(&self.inner);
                let handle = driver.schedule(Box::new(move || {
                    if let Some(inner) = shared.upgrade() {
                        let mut guard = inner.lock();
                        guard.frame = None;
                        apply_pending(&mut guard);
                    }
                }));
                inner.frame = Some(handle);
            }
            FrameScheduling::Immediate => {
                apply_pending(&mut inner);
            }
        }
    }

    /// Force immediate application of any pending commit and cancel the
    /// outstanding frame. Safe to call whether or not a frame is pending.
    pub fn flush(&self) -> bool {
        let mut inner = self.inner.lock();
        cancel_frame(&mut inner);
        apply_pending(&mut inner)
    }

    /// Discard the pending commit without applying it.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        inner.pending = None;
        cancel_frame(&mut inner);
    }

    /// Whether a commit is waiting for the next frame.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// Applied primary rows.
    #[must_use]
    pub fn primary_rows(&self) -> RowSet<R> {
        self.inner.lock().primary.clone()
    }

    /// Applied secondary rows.
    #[must_use]
    pub fn secondary_rows(&self) -> RowSet<R> {
        self.inner.lock().secondary.clone()
    }

    /// Currently selected record id.
    #[must_use]
    pub fn selected_id(&self) -> Option<String> {
        self.inner.lock().selected_id.clone()
    }

    /// Directly set the selection pointer.
    pub fn set_selection(&self, id: Option<&str>) {
        self.inner.lock().selected_id = id.map(str::to_string);
    }

    /// Monotonic invalidation counter for memoized detail views.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    /// Manually advance the version counter.
    pub fn bump_version(&self) {
        self.inner.lock().version += 1;
    }

    /// Cached detail payload for `id`.
    #[must_use]
    pub fn detail(&self, id: &str) -> Option<Value> {
        self.inner.lock().details.get(id).cloned()
    }

    /// Cache a detail payload; a successful set counts the entry as most
    /// recently used and bumps the version.
    pub fn set_detail(&self, id: &str, payload: Value) -> bool {
        let mut inner = self.inner.lock();
        let limit = inner.detail_limit;
        let applied = inner.details.set(id, payload, limit);
        if applied {
            inner.version += 1;
        }
        applied
    }

    /// Number of cached detail payloads.
    #[must_use]
    pub fn detail_len(&self) -> usize {
        self.inner.lock().details.len()
    }

    /// Drop every cached detail payload; bumps the version if any existed.
    pub fn clear_details(&self) {
        let mut inner = self.inner.lock();
        if inner.details.clear() {
            inner.version += 1;
        }
    }

    /// Clear rows, selection, version, details, and any pending commit.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.pending = None;
        cancel_frame(&mut inner);
        inner.primary = empty_rows();
        inner.secondary = empty_rows();
        inner.selected_id = None;
        inner.version = 0;
        inner.details.clear();
    }
}

fn cancel_frame<R>(inner: &mut Inner<R>) {
    if let Some(handle) = inner.frame.take()
        && let FrameScheduling::Driver(driver) = &inner.scheduling
    {
        driver.cancel(handle);
    }
}

fn apply_pending<R: StreamRecord>(inner: &mut Inner<R>) -> bool {
    let Some(commit) = inner.pending.take() else {
        return false;
    };

    let rows_changed = !Arc::ptr_eq(&inner.primary, &commit.primary_rows)
        || !Arc::ptr_eq(&inner.secondary, &commit.secondary_rows);

    // Selection continuity: keep the current id if it survived, else fall
    // back to the first primary row, else clear.
    let next_selected = inner
        .selected_id
        .as_deref()
        .filter(|selected| commit.primary_rows.iter().any(|row| row.id() == *selected))
        .map(str::to_string)
        .or_else(|| {
            commit
                .primary_rows
                .first()
                .map(|row| row.id().to_string())
        });
    let selection_changed = next_selected != inner.selected_id;

    if rows_changed {
        inner.primary = commit.primary_rows;
        inner.secondary = commit.secondary_rows;
    }
    if selection_changed {
        inner.selected_id = next_selected;
    }

    let live_ids = inner.primary.iter().map(|row| row.id()).collect::<Vec<_>>();
    if inner.details.prune(live_ids) {
        inner.version += 1;
    }

    true
}
