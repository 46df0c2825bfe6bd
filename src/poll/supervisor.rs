//! Poll loop that keeps the clinic board fresh and announces serving changes.

use crate::arrival::event::{ArrivalEvent, CallSource};
use crate::defaults;
use crate::error::QueueCallError;
use crate::poll::{PollSource, QueueStatus, RosterEntry};
use crate::sequencer::SequencerHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::POLL_INTERVAL_SECS),
        }
    }
}

/// Last known clinic queue state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicBoard {
    pub status: Option<QueueStatus>,
    pub roster: Vec<RosterEntry>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Error of the most recent poll; cleared by the next good one.
    pub last_error: Option<String>,
}

pub struct PollSupervisor {
    source: Arc<dyn PollSource>,
    sequencer: SequencerHandle,
    config: PollConfig,
}

impl PollSupervisor {
    pub fn new(source: Arc<dyn PollSource>, sequencer: SequencerHandle, config: PollConfig) -> Self {
        Self {
            source,
            sequencer,
            config,
        }
    }

    /// Spawns the poll loop. The first poll runs immediately.
    pub fn start(self) -> PollHandle {
        let (board_tx, board_rx) = watch::channel(ClinicBoard::default());
        let task = tokio::spawn(self.run(board_tx));
        PollHandle {
            board: board_rx,
            task,
        }
    }

    async fn run(self, board: watch::Sender<ClinicBoard>) {
        tracing::info!(
            endpoint = %self.source.endpoint(),
            interval_secs = self.config.interval.as_secs(),
            "poll supervisor started"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut serving: Option<String> = None;

        loop {
            interval.tick().await;

            let (status, roster) = match self.fetch().await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::warn!(error = %e, "clinic poll failed, keeping last board");
                    board.send_modify(|b| b.last_error = Some(e.to_string()));
                    continue;
                }
            };

            if let Some(now) = status.serving() {
                match serving.as_deref() {
                    None => {
                        tracing::debug!(current = now, "serving baseline established");
                        serving = Some(now.to_string());
                    }
                    Some(previous) if previous != now => {
                        tracing::info!(previous, current = now, "now serving changed");
                        serving = Some(now.to_string());
                        let event = clinic_event(&status, &roster);
                        if let Err(QueueCallError::SequencerClosed) = self.sequencer.enqueue(event)
                        {
                            tracing::debug!("sequencer closed, stopping poll supervisor");
                            break;
                        }
                    }
                    Some(_) => {}
                }
            }

            board.send_replace(ClinicBoard {
                status: Some(status),
                roster,
                last_updated: Some(Utc::now()),
                last_error: None,
            });
        }

        tracing::info!("poll supervisor stopped");
    }

    async fn fetch(&self) -> crate::error::Result<(QueueStatus, Vec<RosterEntry>)> {
        let status = self.source.fetch_status().await?;
        let roster = self.source.fetch_roster().await?;
        Ok((status, roster))
    }
}

/// Builds the announcement for the patient now being served.
fn clinic_event(status: &QueueStatus, roster: &[RosterEntry]) -> ArrivalEvent {
    let current = status.current.trim();
    let name = roster
        .iter()
        .find(|entry| entry.queue_code.trim() == current)
        .map(|entry| entry.patient_name.clone())
        .unwrap_or_default();
    let doctor = status.current_doctor.clone().unwrap_or_default();
    ArrivalEvent::new(CallSource::Clinic, current, name, doctor)
}

/// Running poll supervisor.
pub struct PollHandle {
    board: watch::Receiver<ClinicBoard>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn board(&self) -> ClinicBoard {
        self.board.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClinicBoard> {
        self.board.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub async fn stop(self) {
        self.task.abort();
        if let Err(e) = self.task.await
            && !e.is_cancelled()
        {
            tracing::error!(error = %e, "poll supervisor failed");
        }
    }
}
