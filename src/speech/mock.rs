//! Deterministic speech engine for tests.

use crate::error::{QueueCallError, Result};
use crate::speech::SpeechOutput;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    spoken: Mutex<Vec<String>>,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    completed: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Mock speech engine.
///
/// Records every `speak` call in invocation order and tracks how many calls
/// overlap, so tests can assert single-flight.
#[derive(Debug, Clone, Default)]
pub struct MockSpeech {
    state: Arc<MockState>,
    delay: Duration,
    fail_containing: Vec<String>,
    hang_containing: Vec<String>,
}

/// Decrements the outstanding counter however the call ends.
struct InFlight<'a> {
    state: &'a MockState,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.outstanding.fetch_sub(1, Ordering::SeqCst);
        if self.finished {
            self.state.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.state.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every utterance takes `delay` (tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Utterances whose text contains `needle` fail.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing.push(needle.to_string());
        self
    }

    /// Utterances whose text contains `needle` never complete.
    pub fn hanging_on(mut self, needle: &str) -> Self {
        self.hang_containing.push(needle.to_string());
        self
    }

    /// Texts passed to `speak`, in call order.
    pub fn spoken(&self) -> Vec<String> {
        self.state
            .spoken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding calls seen.
    pub fn max_outstanding(&self) -> usize {
        self.state.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.state.completed.load(Ordering::SeqCst)
    }

    /// Calls whose future was dropped before finishing.
    pub fn cancelled(&self) -> usize {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeechOutput for MockSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        let now = self.state.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_outstanding.fetch_max(now, Ordering::SeqCst);
        let mut guard = InFlight {
            state: &self.state,
            finished: false,
        };
        self.state
            .spoken
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text.to_string());

        if self.hang_containing.iter().any(|n| text.contains(n.as_str())) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        guard.finished = true;
        if self.fail_containing.iter().any(|n| text.contains(n.as_str())) {
            return Err(QueueCallError::SpeechFailed {
                message: "mock speech failure".to_string(),
            });
        }
        Ok(())
    }

    fn engine_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let speech = MockSpeech::new();
        speech.speak("one").await.unwrap();
        speech.speak("two").await.unwrap();
        assert_eq!(speech.spoken(), vec!["one", "two"]);
        assert_eq!(speech.completed(), 2);
        assert_eq!(speech.outstanding(), 0);
        assert_eq!(speech.max_outstanding(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let speech = MockSpeech::new().failing_on("Bob");
        assert!(speech.speak("Alice").await.is_ok());
        assert!(matches!(
            speech.speak("Bob").await,
            Err(QueueCallError::SpeechFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_tracks_overlap_and_cancellation() {
        let speech = MockSpeech::new().with_delay(Duration::from_secs(1));
        let (a, b) = tokio::join!(speech.speak("a"), speech.speak("b"));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(speech.max_outstanding(), 2);

        let hanging = MockSpeech::new().hanging_on("stuck");
        let result = tokio::time::timeout(Duration::from_secs(5), hanging.speak("stuck")).await;
        assert!(result.is_err());
        assert_eq!(hanging.cancelled(), 1);
        assert_eq!(hanging.outstanding(), 0);
    }
}
