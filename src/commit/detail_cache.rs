//! Bounded per-record detail cache with insertion-order eviction.
//!
//! Re-inserting an id counts as most recently used: the entry moves to the
//! back of the eviction order. Once the cache exceeds its limit the oldest
//! inserted entry is dropped.

use std::collections::{HashMap, VecDeque};

/// Insertion-order LRU keyed by record id.
#[derive(Debug, Clone, Default)]
pub struct DetailCache<D> {
    entries: HashMap<String, D>,
    order: VecDeque<String>,
}

impl<D> DetailCache<D> {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Number of cached payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached payload for `id`, if present. Does not touch eviction order.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&D> {
        self.entries.get(id)
    }

    /// Insert or update `id`, re-marking it most recently used, then evict
    /// oldest-inserted entries until at most `limit` remain.
    ///
    /// Returns whether the insert was applied (an empty id is rejected).
    pub fn set(&mut self, id: &str, payload: D, limit: usize) -> bool {
        if id.is_empty() {
            return false;
        }
        if self.entries.insert(id.to_string(), payload).is_some() {
            self.order.retain(|existing| existing != id);
        }
        self.order.push_back(id.to_string());
        while self.entries.len() > limit.max(1) {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        true
    }

    /// Drop every entry whose id is absent from `live_ids`.
    ///
    /// Returns whether anything was removed.
    pub fn prune<'a, I>(&mut self, live_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let live: std::collections::HashSet<&str> = live_ids.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|id, _| live.contains(id.as_str()));
        self.order.retain(|id| live.contains(id.as_str()));
        self.entries.len() != before
    }

    /// Remove everything. Returns whether the cache was non-empty.
    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        self.order.clear();
        had_entries
    }
}
