//! Announcement sequencer: FIFO, single-flight access to the speech output.
//!
//! Runs as one task that owns the pending queue. State machine:
//!
//! ```text
//!   Idle --enqueue--> Speaking --done/error/timeout--> Cooldown --queue empty--> Idle
//!                        ^                                 |
//!                        +---------queue non-empty---------+
//! ```
//!
//! `enqueue` is accepted in every state. Shutdown drops the in-flight `speak`
//! future (cancelling the utterance) and the cooldown timer.

pub mod phrase;
pub mod queue;

pub use phrase::PhraseBook;
pub use queue::PendingQueue;

use crate::arrival::event::{ArrivalEvent, CallSource};
use crate::defaults;
use crate::error::{QueueCallError, Result};
use crate::speech::SpeechOutput;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Sequencer settings.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Pause after every announcement.
    pub cooldown: Duration,
    /// Upper bound for one `speak` call.
    pub speech_timeout: Duration,
    pub phrases: PhraseBook,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(defaults::COOLDOWN_MS),
            speech_timeout: Duration::from_millis(defaults::SPEECH_TIMEOUT_MS),
            phrases: PhraseBook::default(),
        }
    }
}

/// Externally visible state machine phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SequencerPhase {
    Idle,
    Speaking {
        source: CallSource,
        identifier: String,
    },
    Cooldown,
}

/// How an announcement ended. Every variant counts as "announced".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AnnouncementOutcome {
    Spoken,
    Failed(String),
    TimedOut,
}

impl AnnouncementOutcome {
    pub fn is_spoken(&self) -> bool {
        matches!(self, AnnouncementOutcome::Spoken)
    }
}

/// Published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerStatus {
    pub phase: SequencerPhase,
    /// Items waiting behind the one being spoken.
    pub queued: usize,
    pub announced: u64,
    pub failed: u64,
}

impl Default for SequencerStatus {
    fn default() -> Self {
        Self {
            phase: SequencerPhase::Idle,
            queued: 0,
            announced: 0,
            failed: 0,
        }
    }
}

/// Receives announcement lifecycle callbacks, synchronously on the sequencer task.
pub trait AnnouncementObserver: Send + Sync {
    fn announcement_started(&self, _event: &ArrivalEvent) {}

    fn announcement_completed(&self, event: &ArrivalEvent, outcome: &AnnouncementOutcome);
}

/// Observer that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl AnnouncementObserver for LogObserver {
    fn announcement_completed(&self, event: &ArrivalEvent, outcome: &AnnouncementOutcome) {
        tracing::debug!(identifier = %event.identifier, ?outcome, "announcement completed");
    }
}

enum Command {
    Enqueue(ArrivalEvent),
    Shutdown,
}

enum Flow {
    Continue,
    Stop,
}

/// Builder for the sequencer task.
pub struct Sequencer {
    config: SequencerConfig,
    observer: Arc<dyn AnnouncementObserver>,
}

impl Sequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            observer: Arc::new(LogObserver),
        }
    }

    /// Sets the announcement observer.
    pub fn with_observer(mut self, observer: Arc<dyn AnnouncementObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Spawns the sequencer task. Must be called inside a tokio runtime.
    pub fn spawn(self, speech: Arc<dyn SpeechOutput>) -> SequencerHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SequencerStatus::default());

        let actor = SequencerActor {
            speech,
            config: self.config,
            observer: self.observer,
            queue: PendingQueue::new(),
            commands: command_rx,
            status: status_tx,
            phase: SequencerPhase::Idle,
            announced: 0,
            failed: 0,
        };
        let task = tokio::spawn(actor.run());

        SequencerHandle {
            commands: command_tx,
            status: status_rx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Shared handle to one sequencer. Clones drive the same queue.
#[derive(Clone)]
pub struct SequencerHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SequencerStatus>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SequencerHandle {
    /// Queues an event for announcement. Duplicates are ignored by the sequencer.
    pub fn enqueue(&self, event: ArrivalEvent) -> Result<()> {
        self.commands
            .send(Command::Enqueue(event))
            .map_err(|_| QueueCallError::SequencerClosed)
    }

    pub fn status(&self) -> SequencerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SequencerStatus> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Stops the sequencer and waits for it to exit.
    ///
    /// Cancels in-flight speech and discards anything still queued. Safe to
    /// call from several clones.
    pub async fn shutdown(&self) {
        // Closed already if another clone shut it down
        self.commands.send(Command::Shutdown).ok();

        let task = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "sequencer task failed");
        }
    }
}

struct SequencerActor {
    speech: Arc<dyn SpeechOutput>,
    config: SequencerConfig,
    observer: Arc<dyn AnnouncementObserver>,
    queue: PendingQueue,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<SequencerStatus>,
    phase: SequencerPhase,
    announced: u64,
    failed: u64,
}

impl SequencerActor {
    async fn run(mut self) {
        tracing::debug!(engine = self.speech.engine_name(), "sequencer started");
        loop {
            let Some(event) = self.queue.start_next() else {
                self.set_phase(SequencerPhase::Idle);
                match self.commands.recv().await {
                    Some(Command::Enqueue(event)) => self.accept(event),
                    Some(Command::Shutdown) | None => break,
                }
                continue;
            };

            if let Flow::Stop = self.speak(event).await {
                break;
            }
            if let Flow::Stop = self.cooldown().await {
                break;
            }
        }

        let dropped = self.queue.clear();
        self.commands.close();
        self.set_phase(SequencerPhase::Idle);
        tracing::info!(dropped, "sequencer stopped");
    }

    fn accept(&mut self, event: ArrivalEvent) {
        let identifier = event.identifier.clone();
        if self.queue.push(event) {
            tracing::debug!(identifier = %identifier, queued = self.queue.len(), "announcement queued");
            self.publish();
        } else {
            tracing::debug!(identifier = %identifier, "duplicate announcement ignored");
        }
    }

    /// Applies a command received while busy. Returns `Stop` on shutdown.
    fn handle(&mut self, command: Option<Command>) -> Flow {
        match command {
            Some(Command::Enqueue(event)) => {
                self.accept(event);
                Flow::Continue
            }
            Some(Command::Shutdown) | None => Flow::Stop,
        }
    }

    async fn speak(&mut self, event: ArrivalEvent) -> Flow {
        let text = self.config.phrases.render(&event);
        self.set_phase(SequencerPhase::Speaking {
            source: event.source,
            identifier: event.identifier.clone(),
        });
        self.observer.announcement_started(&event);
        tracing::info!(source = %event.source, identifier = %event.identifier, text = %text, "announcing");

        let speech = Arc::clone(&self.speech);
        let utterance = speech.speak(&text);
        tokio::pin!(utterance);
        let deadline = tokio::time::sleep(self.config.speech_timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                result = &mut utterance => {
                    break match result {
                        Ok(()) => AnnouncementOutcome::Spoken,
                        Err(e) => AnnouncementOutcome::Failed(e.to_string()),
                    };
                }
                _ = &mut deadline => break AnnouncementOutcome::TimedOut,
                command = self.commands.recv() => {
                    if let Flow::Stop = self.handle(command) {
                        tracing::info!(identifier = %event.identifier, "cancelling announcement");
                        return Flow::Stop;
                    }
                }
            }
        };

        self.queue.finish_speaking();
        self.announced += 1;
        match &outcome {
            AnnouncementOutcome::Spoken => {}
            AnnouncementOutcome::Failed(reason) => {
                self.failed += 1;
                tracing::warn!(identifier = %event.identifier, reason = %reason, "speech failed, continuing");
            }
            AnnouncementOutcome::TimedOut => {
                self.failed += 1;
                tracing::warn!(
                    identifier = %event.identifier,
                    timeout_ms = self.config.speech_timeout.as_millis() as u64,
                    "speech timed out, continuing"
                );
            }
        }
        self.observer.announcement_completed(&event, &outcome);
        Flow::Continue
    }

    async fn cooldown(&mut self) -> Flow {
        self.set_phase(SequencerPhase::Cooldown);
        let timer = tokio::time::sleep(self.config.cooldown);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = &mut timer => return Flow::Continue,
                command = self.commands.recv() => {
                    if let Flow::Stop = self.handle(command) {
                        return Flow::Stop;
                    }
                }
            }
        }
    }

    fn set_phase(&mut self, phase: SequencerPhase) {
        self.phase = phase;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(SequencerStatus {
            phase: self.phase.clone(),
            queued: self.queue.len(),
            announced: self.announced,
            failed: self.failed,
        });
    }
}
