//! Display state reducer for the public call board.

use crate::arrival::event::{ArrivalEvent, CallKey};
use crate::defaults;
use crate::display::ring::BoundedRing;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Reducer input.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayAction {
    ArrivalReceived(ArrivalEvent),
    AnnouncementCompleted(ArrivalEvent),
}

/// Capacities of the bounded lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    pub waiting_capacity: usize,
    pub history_capacity: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            waiting_capacity: defaults::WAITING_CAPACITY,
            history_capacity: defaults::HISTORY_CAPACITY,
        }
    }
}

/// Read-only copy of the board handed to renderers and the control socket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub current: Option<ArrivalEvent>,
    pub waiting: Vec<ArrivalEvent>,
    pub history: Vec<ArrivalEvent>,
}

/// Owns CurrentCall, WaitingPreview and History.
///
/// `pending` holds every arrived-but-not-completed key, independent of the
/// preview capacity, so duplicate arrivals are filtered the same way the
/// sequencer filters them.
#[derive(Debug, Clone)]
pub struct DisplayStore {
    current: Option<ArrivalEvent>,
    waiting: BoundedRing<ArrivalEvent>,
    history: BoundedRing<ArrivalEvent>,
    pending: HashSet<CallKey>,
}

impl Default for DisplayStore {
    fn default() -> Self {
        Self::new(DisplayConfig::default())
    }
}

impl DisplayStore {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            current: None,
            waiting: BoundedRing::new(config.waiting_capacity),
            history: BoundedRing::new(config.history_capacity),
            pending: HashSet::new(),
        }
    }

    /// Applies one action. Returns `false` when the action changed nothing.
    pub fn apply(&mut self, action: DisplayAction) -> bool {
        match action {
            DisplayAction::ArrivalReceived(event) => self.arrival_received(event),
            DisplayAction::AnnouncementCompleted(event) => self.announcement_completed(event),
        }
    }

    fn arrival_received(&mut self, event: ArrivalEvent) -> bool {
        if !self.pending.insert(event.key()) {
            return false;
        }
        if let Some(evicted) = self.waiting.push_front(event) {
            tracing::trace!(identifier = %evicted.identifier, "waiting preview full, oldest hidden");
        }
        true
    }

    fn announcement_completed(&mut self, event: ArrivalEvent) -> bool {
        let key = event.key();
        self.pending.remove(&key);
        self.waiting.remove_by(|e| e.key() == key);
        self.history.push_front(event.clone());
        self.current = Some(event);
        true
    }

    pub fn current(&self) -> Option<&ArrivalEvent> {
        self.current.as_ref()
    }

    pub fn waiting(&self) -> &BoundedRing<ArrivalEvent> {
        &self.waiting
    }

    pub fn history(&self) -> &BoundedRing<ArrivalEvent> {
        &self.history
    }

    /// Number of arrivals not yet announced, including those hidden from the preview.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            current: self.current.clone(),
            waiting: self.waiting.to_vec(),
            history: self.history.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: &str) -> ArrivalEvent {
        ArrivalEvent::pharmacy(id, format!("Name {id}"), "REG")
    }

    fn ids(events: &[ArrivalEvent]) -> Vec<&str> {
        events.iter().map(|e| e.identifier.as_str()).collect()
    }

    #[test]
    fn test_arrival_goes_to_waiting_front() {
        let mut store = DisplayStore::default();
        store.apply(DisplayAction::ArrivalReceived(ev("P1")));
        store.apply(DisplayAction::ArrivalReceived(ev("P2")));

        let snap = store.snapshot();
        assert_eq!(ids(&snap.waiting), vec!["P2", "P1"]);
        assert!(snap.current.is_none());
        assert!(snap.history.is_empty());
    }

    #[test]
    fn test_completion_moves_item_to_current_and_history() {
        let mut store = DisplayStore::default();
        store.apply(DisplayAction::ArrivalReceived(ev("P1")));
        store.apply(DisplayAction::ArrivalReceived(ev("P2")));
        store.apply(DisplayAction::AnnouncementCompleted(ev("P1")));

        let snap = store.snapshot();
        assert_eq!(snap.current.as_ref().map(|e| e.identifier.as_str()), Some("P1"));
        assert_eq!(ids(&snap.waiting), vec!["P2"]);
        assert_eq!(ids(&snap.history), vec!["P1"]);
    }

    #[test]
    fn test_current_call_follows_completions() {
        let mut store = DisplayStore::default();
        store.apply(DisplayAction::ArrivalReceived(ev("P1")));
        store.apply(DisplayAction::ArrivalReceived(ev("P2")));

        store.apply(DisplayAction::AnnouncementCompleted(ev("P1")));
        assert_eq!(store.current().map(|e| e.identifier.as_str()), Some("P1"));

        store.apply(DisplayAction::AnnouncementCompleted(ev("P2")));
        assert_eq!(store.current().map(|e| e.identifier.as_str()), Some("P2"));
        assert!(store.waiting().is_empty());
        assert_eq!(ids(&store.snapshot().history), vec!["P2", "P1"]);
    }

    #[test]
    fn test_duplicate_arrival_yields_one_history_entry() {
        let mut store = DisplayStore::default();
        assert!(store.apply(DisplayAction::ArrivalReceived(ev("P1"))));
        assert!(!store.apply(DisplayAction::ArrivalReceived(ev("P1"))));
        assert_eq!(store.waiting().len(), 1);

        store.apply(DisplayAction::AnnouncementCompleted(ev("P1")));
        assert_eq!(store.history().len(), 1);
        assert!(store.waiting().is_empty());
    }

    #[test]
    fn test_preview_keeps_five_most_recent() {
        let mut store = DisplayStore::default();
        for i in 1..=6 {
            store.apply(DisplayAction::ArrivalReceived(ev(&format!("P{i}"))));
        }
        let snap = store.snapshot();
        assert_eq!(ids(&snap.waiting), vec!["P6", "P5", "P4", "P3", "P2"]);
        assert_eq!(store.pending(), 6);
    }

    #[test]
    fn test_evicted_arrival_still_deduplicated() {
        let mut store = DisplayStore::new(DisplayConfig {
            waiting_capacity: 2,
            history_capacity: 20,
        });
        for id in ["P1", "P2", "P3"] {
            store.apply(DisplayAction::ArrivalReceived(ev(id)));
        }
        // P1 is hidden from the preview but still pending
        assert!(!store.apply(DisplayAction::ArrivalReceived(ev("P1"))));
        assert_eq!(ids(&store.snapshot().waiting), vec!["P3", "P2"]);

        store.apply(DisplayAction::AnnouncementCompleted(ev("P1")));
        assert_eq!(ids(&store.snapshot().waiting), vec!["P3", "P2"]);
        assert_eq!(store.pending(), 2);
    }

    #[test]
    fn test_history_bounded() {
        let mut store = DisplayStore::new(DisplayConfig {
            waiting_capacity: 5,
            history_capacity: 3,
        });
        for i in 1..=5 {
            let e = ev(&format!("P{i}"));
            store.apply(DisplayAction::ArrivalReceived(e.clone()));
            store.apply(DisplayAction::AnnouncementCompleted(e));
        }
        assert_eq!(ids(&store.snapshot().history), vec!["P5", "P4", "P3"]);
    }

    #[test]
    fn test_item_active_in_one_place_only() {
        let mut store = DisplayStore::default();
        store.apply(DisplayAction::ArrivalReceived(ev("P1")));
        store.apply(DisplayAction::AnnouncementCompleted(ev("P1")));
        let key = ev("P1").key();
        assert!(!store.waiting().contains_by(|e| e.key() == key));
        assert_eq!(store.current().map(ArrivalEvent::key), Some(key));
    }

    #[test]
    fn test_recalled_identifier_returns_to_preview() {
        let mut store = DisplayStore::default();
        store.apply(DisplayAction::ArrivalReceived(ev("P1")));
        store.apply(DisplayAction::AnnouncementCompleted(ev("P1")));
        assert!(store.apply(DisplayAction::ArrivalReceived(ev("P1"))));
        assert_eq!(ids(&store.snapshot().waiting), vec!["P1"]);
    }
}
