//! Fixed-capacity FIFO overwrite buffer.
//!
//! The leaf container under every bounded history in this crate: telemetry
//! sample windows, frame-delta logs, the simulator's event tail. Pushing past
//! capacity evicts the oldest element; capacity is fixed at construction and a
//! zero-capacity buffer is a no-op sink.

use std::collections::VecDeque;

/// Ring buffer holding at most `capacity` elements in insertion order.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Append one element, evicting the oldest if the buffer is full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Append every element of `items` in order.
    pub fn append_many<I: IntoIterator<Item = T>>(&mut self, items: I) {
        for item in items {
            self.push(item);
        }
    }

    /// Number of elements currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The fixed capacity set at construction.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove all elements without changing capacity.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate oldest to newest without consuming.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Most recently pushed element, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest retained element, if any.
    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Snapshot of the contents, oldest to newest, detached from the buffer.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
