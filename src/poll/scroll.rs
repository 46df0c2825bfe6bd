//! Auto-scroll for the roster list.
//!
//! [`AutoScroll`] is the pure tick state machine; [`AutoScroller`] drives it
//! from a timer task that exists only while scrolling is enabled.

use crate::defaults;
use crate::poll::supervisor::ClinicBoard;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollConfig {
    pub tick: Duration,
    /// Rows advanced per tick.
    pub step_rows: usize,
    /// Hold time at the bottom before jumping back to the top.
    pub pause: Duration,
    pub viewport_rows: usize,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(defaults::SCROLL_TICK_MS),
            step_rows: defaults::SCROLL_STEP_ROWS,
            pause: Duration::from_millis(defaults::SCROLL_PAUSE_MS),
            viewport_rows: defaults::SCROLL_VIEWPORT_ROWS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutoScroll {
    config: ScrollConfig,
    offset: usize,
    content_rows: usize,
    /// Time left at the bottom; `Some` while paused.
    paused: Option<Duration>,
}

impl AutoScroll {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            offset: 0,
            content_rows: 0,
            paused: None,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    fn max_offset(&self) -> usize {
        self.content_rows.saturating_sub(self.config.viewport_rows)
    }

    /// Updates the content height, clamping the offset if the list shrank.
    pub fn set_content_rows(&mut self, rows: usize) {
        self.content_rows = rows;
        if self.offset > self.max_offset() {
            self.offset = self.max_offset();
        }
        if self.max_offset() == 0 {
            self.paused = None;
        }
    }

    /// Advances one tick and returns the new offset.
    pub fn tick(&mut self) -> usize {
        let max = self.max_offset();
        if max == 0 {
            self.offset = 0;
            return 0;
        }

        if let Some(remaining) = self.paused {
            if remaining <= self.config.tick {
                self.paused = None;
                self.offset = 0;
            } else {
                self.paused = Some(remaining - self.config.tick);
            }
            return self.offset;
        }

        self.offset = (self.offset + self.config.step_rows).min(max);
        if self.offset == max {
            self.paused = Some(self.config.pause);
        }
        self.offset
    }

    pub fn reset(&mut self) {
        self.offset = 0;
        self.paused = None;
    }
}

/// Timer-driven auto-scroll over the clinic roster.
///
/// The timer task is aborted when scrolling is disabled and when the
/// scroller is dropped.
pub struct AutoScroller {
    config: ScrollConfig,
    board: watch::Receiver<ClinicBoard>,
    offset: Arc<watch::Sender<usize>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoScroller {
    pub fn new(config: ScrollConfig, board: watch::Receiver<ClinicBoard>) -> Self {
        let (offset, _) = watch::channel(0);
        Self {
            config,
            board,
            offset: Arc::new(offset),
            task: Mutex::new(None),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match (enabled, task.is_some()) {
            (true, false) => {
                *task = Some(tokio::spawn(drive(
                    self.config,
                    self.board.clone(),
                    Arc::clone(&self.offset),
                )));
                tracing::debug!("auto-scroll enabled");
            }
            (false, true) => {
                if let Some(handle) = task.take() {
                    handle.abort();
                }
                self.offset.send_replace(0);
                tracing::debug!("auto-scroll disabled");
            }
            _ => {}
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    pub fn offset(&self) -> usize {
        *self.offset.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.offset.subscribe()
    }
}

impl Drop for AutoScroller {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

async fn drive(
    config: ScrollConfig,
    board: watch::Receiver<ClinicBoard>,
    offset: Arc<watch::Sender<usize>>,
) {
    let mut scroll = AutoScroll::new(config);
    let mut ticker = tokio::time::interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let rows = board.borrow().roster.len();
        scroll.set_content_rows(rows);
        let next = scroll.tick();
        offset.send_if_modified(|current| {
            let changed = *current != next;
            *current = next;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::RosterEntry;

    fn config() -> ScrollConfig {
        ScrollConfig {
            tick: Duration::from_millis(50),
            step_rows: 1,
            pause: Duration::from_millis(150),
            viewport_rows: 3,
        }
    }

    #[test]
    fn test_scrolls_to_end_then_pauses_then_resets() {
        let mut scroll = AutoScroll::new(config());
        scroll.set_content_rows(5);

        assert_eq!(scroll.tick(), 1);
        assert_eq!(scroll.tick(), 2);
        assert!(scroll.is_paused());
        // Three ticks of pause at the bottom
        assert_eq!(scroll.tick(), 2);
        assert_eq!(scroll.tick(), 2);
        assert_eq!(scroll.tick(), 0);
        assert!(!scroll.is_paused());
        assert_eq!(scroll.tick(), 1);
    }

    #[test]
    fn test_content_that_fits_does_not_scroll() {
        let mut scroll = AutoScroll::new(config());
        scroll.set_content_rows(3);
        for _ in 0..10 {
            assert_eq!(scroll.tick(), 0);
        }
    }

    #[test]
    fn test_shrinking_content_clamps_offset() {
        let mut scroll = AutoScroll::new(config());
        scroll.set_content_rows(10);
        for _ in 0..5 {
            scroll.tick();
        }
        assert_eq!(scroll.offset(), 5);
        scroll.set_content_rows(6);
        assert_eq!(scroll.offset(), 3);
        scroll.set_content_rows(2);
        assert_eq!(scroll.offset(), 0);
    }

    #[test]
    fn test_step_larger_than_remaining() {
        let mut scroll = AutoScroll::new(ScrollConfig {
            step_rows: 4,
            ..config()
        });
        scroll.set_content_rows(9);
        assert_eq!(scroll.tick(), 4);
        assert_eq!(scroll.tick(), 6);
        assert!(scroll.is_paused());
    }

    fn board_with_rows(rows: usize) -> watch::Sender<ClinicBoard> {
        let roster = (0..rows)
            .map(|i| RosterEntry::new(format!("A{i}"), format!("Patient {i}")))
            .collect();
        let (tx, _) = watch::channel(ClinicBoard {
            roster,
            ..ClinicBoard::default()
        });
        tx
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_advances_while_enabled() {
        let board = board_with_rows(8);
        let scroller = AutoScroller::new(config(), board.subscribe());
        assert!(!scroller.is_enabled());

        scroller.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(scroller.offset(), 2);

        scroller.set_enabled(false);
        assert!(!scroller.is_enabled());
        assert_eq!(scroller.offset(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(scroller.offset(), 0, "timer stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_is_idempotent() {
        let board = board_with_rows(8);
        let scroller = AutoScroller::new(config(), board.subscribe());
        scroller.set_enabled(true);
        scroller.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(scroller.offset(), 2, "single timer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timer() {
        let board = board_with_rows(8);
        let scroller = AutoScroller::new(config(), board.subscribe());
        let mut offsets = scroller.subscribe();
        scroller.set_enabled(true);
        tokio::time::sleep(Duration::from_millis(60)).await;
        drop(scroller);

        offsets.borrow_and_update();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!offsets.has_changed().unwrap_or(false));
    }
}
