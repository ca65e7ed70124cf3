//! Bounded FIFO work queue for breadth-first traversal
//!
//! The queue never grows past its capacity: an entry offered to a full queue
//! is dropped. Walking a tree wider than the bound therefore omits branches.
//! This trades completeness for a hard memory ceiling on pathological trees,
//! and the drop count stays inspectable so callers can surface it.

use std::collections::VecDeque;

/// Default number of pending entries.
pub const DEFAULT_CAPACITY: usize = 1000;

/// A FIFO with a fixed capacity that drops entries when full.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: usize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` pending entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            dropped: 0,
        }
    }

    /// Append `item` at the back.
    ///
    /// Returns `false` and discards the item when the queue is full.
    pub fn enqueue(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            if self.dropped == 0 {
                tracing::warn!(capacity = self.capacity, "work queue full, dropping entries");
            }
            self.dropped += 1;
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Remove the front entry; `None` when empty.
    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many entries were discarded because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
