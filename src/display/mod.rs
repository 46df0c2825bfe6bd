//! Public display state.
//!
//! All writes go through one ordered channel into a single task that owns the
//! [`DisplayStore`]; readers get whole [`DisplaySnapshot`]s from a watch channel.

pub mod ring;
pub mod store;

pub use ring::BoundedRing;
pub use store::{DisplayAction, DisplayConfig, DisplaySnapshot, DisplayStore};

use crate::arrival::event::{ArrivalEvent, CallSource};
use crate::sequencer::{AnnouncementObserver, AnnouncementOutcome};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Write side of the display task. Clones share the same ordered channel.
#[derive(Debug, Clone)]
pub struct DisplayFeed {
    actions: mpsc::UnboundedSender<DisplayAction>,
    source: CallSource,
}

impl DisplayFeed {
    pub fn arrival(&self, event: ArrivalEvent) {
        self.send(DisplayAction::ArrivalReceived(event));
    }

    pub fn completed(&self, event: ArrivalEvent) {
        self.send(DisplayAction::AnnouncementCompleted(event));
    }

    fn send(&self, action: DisplayAction) {
        if self.actions.send(action).is_err() {
            tracing::debug!("display task stopped, action dropped");
        }
    }
}

/// Forwards completions for this feed's source; other sources have their own board.
impl AnnouncementObserver for DisplayFeed {
    fn announcement_completed(&self, event: &ArrivalEvent, outcome: &AnnouncementOutcome) {
        if event.source == self.source {
            tracing::debug!(identifier = %event.identifier, ?outcome, "display: announcement completed");
            self.completed(event.clone());
        }
    }
}

/// Running display task.
pub struct Display {
    feed: DisplayFeed,
    snapshots: watch::Receiver<DisplaySnapshot>,
    task: JoinHandle<()>,
}

impl Display {
    /// Spawns the task that owns the store for `source` events.
    pub fn spawn(config: DisplayConfig, source: CallSource) -> Self {
        let (actions_tx, mut actions_rx) = mpsc::unbounded_channel();
        let mut store = DisplayStore::new(config);
        let (snapshot_tx, snapshot_rx) = watch::channel(store.snapshot());

        let task = tokio::spawn(async move {
            while let Some(action) = actions_rx.recv().await {
                if store.apply(action) {
                    snapshot_tx.send_replace(store.snapshot());
                }
            }
        });

        Self {
            feed: DisplayFeed {
                actions: actions_tx,
                source,
            },
            snapshots: snapshot_rx,
            task,
        }
    }

    pub fn feed(&self) -> DisplayFeed {
        self.feed.clone()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplaySnapshot> {
        self.snapshots.clone()
    }

    pub async fn stop(self) {
        self.task.abort();
        if let Err(e) = self.task.await
            && !e.is_cancelled()
        {
            tracing::error!(error = %e, "display task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn test_actions_applied_in_order() {
        let display = Display::spawn(DisplayConfig::default(), CallSource::Pharmacy);
        let feed = display.feed();

        let p1 = ArrivalEvent::pharmacy("P1", "Alice", "R1");
        feed.arrival(p1.clone());
        feed.completed(p1);
        settle().await;

        let snap = display.snapshot();
        assert_eq!(snap.current.map(|e| e.identifier), Some("P1".to_string()));
        assert!(snap.waiting.is_empty());
        display.stop().await;
    }

    #[tokio::test]
    async fn test_observer_ignores_other_sources() {
        let display = Display::spawn(DisplayConfig::default(), CallSource::Pharmacy);
        let feed = display.feed();

        let clinic = ArrivalEvent::new(CallSource::Clinic, "A3", "", "dr. X");
        feed.announcement_completed(&clinic, &AnnouncementOutcome::Spoken);
        let p1 = ArrivalEvent::pharmacy("P1", "Alice", "R1");
        feed.arrival(p1.clone());
        feed.announcement_completed(&p1, &AnnouncementOutcome::TimedOut);
        settle().await;

        let snap = display.snapshot();
        assert_eq!(snap.history.len(), 1);
        assert_eq!(snap.history[0].identifier, "P1");
        display.stop().await;
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let display = Display::spawn(DisplayConfig::default(), CallSource::Pharmacy);
        let mut rx = display.subscribe();
        display.feed().arrival(ArrivalEvent::pharmacy("P9", "Zed", "R"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().waiting.len(), 1);
        display.stop().await;
    }
}
