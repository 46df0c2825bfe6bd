//! Fixed-capacity, newest-first list.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;

/// Bounded list ordered newest first.
///
/// Storage is allocated once; pushing onto a full ring evicts the oldest
/// entry in O(1).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedRing<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Inserts `item` as the newest entry. Returns the evicted oldest entry, if any.
    pub fn push_front(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_back()
        } else {
            None
        };
        self.items.push_front(item);
        evicted
    }

    /// Removes the first entry matching `predicate`.
    pub fn remove_by(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.items.iter().position(predicate)?;
        self.items.remove(index)
    }

    pub fn contains_by(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.items.iter().any(predicate)
    }

    /// Newest entry.
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Iterates newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> BoundedRing<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T: Serialize> Serialize for BoundedRing<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}
