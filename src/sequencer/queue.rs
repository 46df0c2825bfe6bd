//! Pending announcement queue with identifier de-duplication.

use crate::arrival::event::{ArrivalEvent, CallKey};
use std::collections::{HashSet, VecDeque};

/// FIFO of events awaiting speech plus the item currently being spoken.
///
/// `keys` always holds exactly the keys of `items`, so membership checks are
/// O(1).
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<ArrivalEvent>,
    keys: HashSet<CallKey>,
    speaking: Option<CallKey>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `event` unless it is already queued or being spoken.
    pub fn push(&mut self, event: ArrivalEvent) -> bool {
        let key = event.key();
        if self.speaking.as_ref() == Some(&key) || self.keys.contains(&key) {
            return false;
        }
        self.keys.insert(key);
        self.items.push_back(event);
        true
    }

    /// Moves the head of the queue into the speaking slot.
    pub fn start_next(&mut self) -> Option<ArrivalEvent> {
        let event = self.items.pop_front()?;
        let key = event.key();
        self.keys.remove(&key);
        self.speaking = Some(key);
        Some(event)
    }

    /// Frees the speaking slot; the identifier may be queued again afterwards.
    pub fn finish_speaking(&mut self) {
        self.speaking = None;
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops everything, returning how many queued items were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        self.keys.clear();
        self.speaking = None;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::event::CallSource;

    fn ev(id: &str) -> ArrivalEvent {
        ArrivalEvent::pharmacy(id, "Name", "Code")
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = PendingQueue::new();
        assert!(queue.push(ev("1")));
        assert!(queue.push(ev("2")));
        assert!(queue.push(ev("3")));

        let order: Vec<String> = std::iter::from_fn(|| {
            let next = queue.start_next();
            queue.finish_speaking();
            next
        })
        .map(|e| e.identifier)
        .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_rejects_duplicate_while_queued() {
        let mut queue = PendingQueue::new();
        assert!(queue.push(ev("1")));
        assert!(!queue.push(ev("1")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_rejects_duplicate_while_speaking() {
        let mut queue = PendingQueue::new();
        queue.push(ev("1"));
        queue.start_next();
        assert!(queue.is_speaking());
        assert!(!queue.push(ev("1")));
        assert!(queue.is_empty());

        queue.finish_speaking();
        assert!(queue.push(ev("1")), "accepted again once spoken");
    }

    #[test]
    fn test_same_identifier_from_other_source_is_distinct() {
        let mut queue = PendingQueue::new();
        assert!(queue.push(ev("7")));
        assert!(queue.push(ArrivalEvent::new(CallSource::Clinic, "7", "", "")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut queue = PendingQueue::new();
        queue.push(ev("1"));
        queue.push(ev("2"));
        queue.start_next();
        assert_eq!(queue.clear(), 1);
        assert!(!queue.is_speaking());
        assert!(queue.push(ev("2")));
    }
}
