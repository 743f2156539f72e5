//! Deduplicating, age-windowed, bounded live record store.
//!
//! The merge preserves *identity*: a record whose tracked fields are unchanged
//! keeps the `Arc` already stored for its id, and a snapshot whose resulting
//! row order is unchanged position-by-position returns the exact same
//! `Arc<[_]>` as the previous call. Downstream renderers rely on both levels
//! of pointer equality to skip work.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::window::record::{RowSet, StreamRecord, empty_rows};

/// Per-call merge options.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// Retention cap; zero yields an empty result and clears state.
    pub max_items: usize,
    /// Optional age window; records observed before `now - max_age_ms` drop.
    pub max_age_ms: Option<u64>,
    /// Override for "now" in Unix ms; defaults to the wall clock.
    pub now_unix_ms: Option<u64>,
}

impl SnapshotOptions {
    /// Options with only a retention cap.
    #[must_use]
    pub const fn capped(max_items: usize) -> Self {
        Self {
            max_items,
            max_age_ms: None,
            now_unix_ms: None,
        }
    }
}

/// Result of one merge call.
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    /// Rows in display priority order, most relevant first.
    pub rows: RowSet<R>,
    /// Whether `rows` differs from the previous snapshot by position-wise
    /// identity. When false, `rows` is the previous call's exact `Arc`.
    pub changed: bool,
}

/// Bounded dedup/age-window merge state for one feed.
#[derive(Debug)]
pub struct LiveWindowStore<R> {
    by_id: HashMap<String, Arc<R>>,
    order: Vec<String>,
    rows: RowSet<R>,
}

impl<R> Default for LiveWindowStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> LiveWindowStore<R> {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            order: Vec::new(),
            rows: empty_rows(),
        }
    }

    /// Current rows without mutating state.
    #[must_use]
    pub fn rows(&self) -> RowSet<R> {
        self.rows.clone()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Clear all state.
    pub fn reset(&mut self) {
        self.by_id.clear();
        self.order.clear();
        self.rows = empty_rows();
    }
}

impl<R: StreamRecord> LiveWindowStore<R> {
    /// Merge an incoming batch against previous state.
    ///
    /// Two phases: incoming records first, in batch order (first occurrence
    /// of an id wins, age-window filtered, content-equal records reuse the
    /// stored `Arc`), then backfill from the previous priority order until
    /// the cap is reached. Incoming records therefore always outrank
    /// carried-over ones, while still-valid older records keep filling the
    /// window instead of shrinking it.
    pub fn snapshot(&mut self, incoming: &[R], options: &SnapshotOptions) -> Snapshot<R> {
        let cap = options.max_items;
        let cutoff = options.max_age_ms.map(|age| {
            let now = options.now_unix_ms.unwrap_or_else(now_unix_ms);
            now.saturating_sub(age)
        });

        let mut next: Vec<Arc<R>> = Vec::with_capacity(cap.min(incoming.len() + self.order.len()));
        let mut seen: HashSet<&str> = HashSet::with_capacity(next.capacity());

        for record in incoming {
            if next.len() >= cap {
                break;
            }
            let id = record.id();
            if id.is_empty() || seen.contains(id) {
                continue;
            }
            if outside_window(record.observed_at_ms(), cutoff) {
                continue;
            }
            let entry = match self.by_id.get(id) {
                Some(stored) if stored.same_content(record) => Arc::clone(stored),
                _ => Arc::new(record.clone()),
            };
            seen.insert(id);
            next.push(entry);
        }

        for id in &self.order {
            if next.len() >= cap {
                break;
            }
            if seen.contains(id.as_str()) {
                continue;
            }
            let Some(stored) = self.by_id.get(id) else {
                continue;
            };
            if outside_window(stored.observed_at_ms(), cutoff) {
                continue;
            }
            seen.insert(id.as_str());
            next.push(Arc::clone(stored));
        }

        let changed = next.len() != self.rows.len()
            || next
                .iter()
                .zip(self.rows.iter())
                .any(|(a, b)| !Arc::ptr_eq(a, b));
        drop(seen);

        if !changed {
            return Snapshot {
                rows: self.rows.clone(),
                changed: false,
            };
        }

        self.order = next.iter().map(|r| r.id().to_string()).collect();
        self.by_id = self
            .order
            .iter()
            .cloned()
            .zip(next.iter().map(Arc::clone))
            .collect();
        self.rows = Arc::from(next);
        Snapshot {
            rows: self.rows.clone(),
            changed: true,
        }
    }
}

fn outside_window(observed_at_ms: Option<u64>, cutoff: Option<u64>) -> bool {
    match (observed_at_ms, cutoff) {
        (Some(at), Some(cutoff)) => at < cutoff,
        // Records without a timestamp are always within the window.
        _ => false,
    }
}

/// Current wall clock in Unix ms.
#[must_use]
pub fn now_unix_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::{LiveWindowStore, SnapshotOptions};
    use crate::window::record::TxRecord;

    fn tx(id: &str, amount: i64) -> TxRecord {
        TxRecord::payment(id, amount)
    }

    fn ids(rows: &[Arc<TxRecord>]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn incoming_outranks_carried_over() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions::capped(3);
        store.snapshot(&[tx("03", 3), tx("02", 2), tx("01", 1)], &opts);

        let out = store.snapshot(&[tx("04", 4), tx("02", 22)], &opts);
        assert!(out.changed);
        assert_eq!(ids(&out.rows), vec!["04", "02", "03"]);
        assert_eq!(out.rows[1].amount_minor, 22);
    }

    #[test]
    fn idempotent_snapshot_returns_same_arc() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions::capped(5);
        let batch = [tx("a", 1), tx("b", 2)];
        let first = store.snapshot(&batch, &opts);
        let second = store.snapshot(&batch, &opts);
        assert!(first.changed);
        assert!(!second.changed);
        assert!(std::ptr::eq(first.rows.as_ptr(), second.rows.as_ptr()));
    }

    #[test]
    fn unchanged_record_keeps_stored_identity() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions::capped(5);
        let first = store.snapshot(&[tx("a", 1)], &opts);
        // Same content, later observation: identity must survive.
        let second = store.snapshot(&[tx("a", 1).observed_at(99)], &opts);
        assert!(Arc::ptr_eq(&first.rows[0], &second.rows[0]));
    }

    #[test]
    fn changed_record_gets_fresh_identity() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions::capped(5);
        let first = store.snapshot(&[tx("a", 1)], &opts);
        let second = store.snapshot(&[tx("a", 2)], &opts);
        assert!(second.changed);
        assert!(!Arc::ptr_eq(&first.rows[0], &second.rows[0]));
    }

    #[test]
    fn age_window_evicts_stale_records() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions {
            max_items: 5,
            max_age_ms: Some(800),
            now_unix_ms: Some(2_600),
        };
        store.snapshot(&[tx("old", 1).observed_at(1_500), tx("new", 2).observed_at(2_500)], &opts);
        assert_eq!(ids(&store.rows()), vec!["new"]);

        // Previously stored records re-check the window on backfill.
        let out = store.snapshot(&[tx("newer", 3).observed_at(2_600)], &opts);
        assert_eq!(ids(&out.rows), vec!["newer", "new"]);
    }

    #[test]
    fn records_without_timestamp_never_age_out() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions {
            max_items: 5,
            max_age_ms: Some(10),
            now_unix_ms: Some(1_000_000),
        };
        let out = store.snapshot(&[tx("a", 1)], &opts);
        assert_eq!(ids(&out.rows), vec!["a"]);
    }

    #[test]
    fn missing_id_and_duplicates_are_excluded() {
        let mut store = LiveWindowStore::new();
        let opts = SnapshotOptions::capped(5);
        let out = store.snapshot(&[tx("", 9), tx("a", 1), tx("a", 2)], &opts);
        assert_eq!(ids(&out.rows), vec!["a"]);
        // First occurrence wins.
        assert_eq!(out.rows[0].amount_minor, 1);
    }

    #[test]
    fn zero_cap_clears_state() {
        let mut store = LiveWindowStore::new();
        store.snapshot(&[tx("a", 1)], &SnapshotOptions::capped(5));
        let out = store.snapshot(&[tx("b", 2)], &SnapshotOptions::capped(0));
        assert!(out.changed);
        assert!(out.rows.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = LiveWindowStore::new();
        store.snapshot(&[tx("a", 1)], &SnapshotOptions::capped(5));
        store.reset();
        assert!(store.is_empty());
        assert!(store.rows().is_empty());
    }

    proptest! {
        #[test]
        fn window_is_always_bounded_and_deduplicated(
            cap in 0usize..12,
            batches in proptest::collection::vec(
                proptest::collection::vec((0u8..16, -100i64..100), 0..24),
                1..8,
            ),
        ) {
            let mut store = LiveWindowStore::new();
            let opts = SnapshotOptions::capped(cap);
            for batch in &batches {
                let records: Vec<TxRecord> = batch
                    .iter()
                    .map(|(id, amount)| tx(&format!("tx-{id}"), *amount))
                    .collect();
                let out = store.snapshot(&records, &opts);
                prop_assert!(out.rows.len() <= cap);
                let mut unique: Vec<&str> = out.rows.iter().map(|r| r.id.as_str()).collect();
                unique.sort_unstable();
                unique.dedup();
                prop_assert_eq!(unique.len(), out.rows.len());

                // Replay of the identical batch is a no-op with stable identity.
                let replay = store.snapshot(&records, &opts);
                prop_assert!(!replay.changed);
                prop_assert!(std::ptr::eq(replay.rows.as_ptr(), out.rows.as_ptr()));
            }
        }
    }
}
