//! Live poll supervisor for the clinic queue board.
//!
//! Periodically fetches the "now serving" status and the patient roster,
//! publishes them as a [`ClinicBoard`], and feeds changes of the serving
//! number into the shared announcement sequencer.

#[cfg(feature = "http-poll")]
pub mod http;
pub mod scroll;
pub mod supervisor;

#[cfg(feature = "http-poll")]
pub use http::HttpPollSource;
pub use scroll::{AutoScroll, AutoScroller, ScrollConfig};
pub use supervisor::{ClinicBoard, PollConfig, PollHandle, PollSupervisor};

use crate::error::{QueueCallError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Queue-status endpoint body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    #[serde(deserialize_with = "string_or_number")]
    pub current: String,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub remaining: u64,
    #[serde(default)]
    pub current_doctor: Option<String>,
}

impl QueueStatus {
    pub fn new(current: impl Into<String>, total: u64, remaining: u64) -> Self {
        Self {
            current: current.into(),
            total,
            remaining,
            current_doctor: None,
        }
    }

    pub fn with_doctor(mut self, doctor: impl Into<String>) -> Self {
        self.current_doctor = Some(doctor.into());
        self
    }

    /// Serving number with surrounding whitespace removed; `None` when nobody is served.
    pub fn serving(&self) -> Option<&str> {
        let current = self.current.trim();
        (!current.is_empty()).then_some(current)
    }
}

/// One roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub queue_code: String,
    pub patient_name: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub is_waiting: bool,
}

impl RosterEntry {
    pub fn new(queue_code: impl Into<String>, patient_name: impl Into<String>) -> Self {
        Self {
            queue_code: queue_code.into(),
            patient_name: patient_name.into(),
            time: String::new(),
            is_waiting: true,
        }
    }
}

/// Queue numbers are sometimes sent as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Source of clinic queue data.
#[async_trait::async_trait]
pub trait PollSource: Send + Sync {
    async fn fetch_status(&self) -> Result<QueueStatus>;

    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>>;

    /// Human-readable location for logs.
    fn endpoint(&self) -> String;
}

#[async_trait::async_trait]
impl<T: PollSource + ?Sized> PollSource for Arc<T> {
    async fn fetch_status(&self) -> Result<QueueStatus> {
        (**self).fetch_status().await
    }

    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>> {
        (**self).fetch_roster().await
    }

    fn endpoint(&self) -> String {
        (**self).endpoint()
    }
}

#[derive(Debug, Default)]
struct MockPollState {
    statuses: VecDeque<Result<QueueStatus>>,
    last_status: Option<QueueStatus>,
    roster: Vec<RosterEntry>,
    polls: usize,
}

/// Scripted poll source for tests.
///
/// Each `fetch_status` pops the next scripted response; once the script is
/// exhausted the last successful status is repeated.
#[derive(Debug, Clone, Default)]
pub struct MockPollSource {
    state: Arc<Mutex<MockPollState>>,
}

impl MockPollSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: QueueStatus) -> &Self {
        self.lock().statuses.push_back(Ok(status));
        self
    }

    pub fn push_error(&self, message: &str) -> &Self {
        self.lock().statuses.push_back(Err(QueueCallError::Poll {
            message: message.to_string(),
        }));
        self
    }

    pub fn set_roster(&self, roster: Vec<RosterEntry>) {
        self.lock().roster = roster;
    }

    /// Number of `fetch_status` calls so far.
    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockPollState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl PollSource for MockPollSource {
    async fn fetch_status(&self) -> Result<QueueStatus> {
        let mut state = self.lock();
        state.polls += 1;
        match state.statuses.pop_front() {
            Some(Ok(status)) => {
                state.last_status = Some(status.clone());
                Ok(status)
            }
            Some(Err(e)) => Err(e),
            None => state.last_status.clone().ok_or_else(|| QueueCallError::Poll {
                message: "no status scripted".to_string(),
            }),
        }
    }

    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>> {
        Ok(self.lock().roster.clone())
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}
