//! Arrival channel adapter: room subscription, reconnect, payload normalization.

use crate::arrival::event::ArrivalEvent;
use crate::arrival::transport::PushTransport;
use crate::defaults;
use crate::error::{QueueCallError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Push channel connection status, as shown on the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_live(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "live"),
        }
    }
}

/// Channel adapter settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub room: String,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            room: defaults::PHARMACY_ROOM.to_string(),
            reconnect_initial: Duration::from_millis(defaults::RECONNECT_INITIAL_MS),
            reconnect_max: Duration::from_millis(defaults::RECONNECT_MAX_MS),
        }
    }
}

/// Counters for the control socket and logs.
#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    malformed: AtomicU64,
    sessions: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            received: self.received.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of channel counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelStats {
    pub received: u64,
    pub malformed: u64,
    pub sessions: u64,
}

type ArrivalCallback = Arc<dyn Fn(ArrivalEvent) + Send + Sync>;

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Cloneable read side of an [`ArrivalChannel`].
#[derive(Debug, Clone)]
pub struct ChannelMonitor {
    state: watch::Receiver<ConnectionState>,
    counters: Arc<Counters>,
}

impl ChannelMonitor {
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> ChannelStats {
        self.counters.snapshot()
    }
}

/// Subscribes to a push room and forwards valid arrivals to one callback.
///
/// Duplicates are forwarded as-is; the sequencer and the display store
/// de-duplicate on their own.
pub struct ArrivalChannel {
    transport: Arc<dyn PushTransport>,
    config: ChannelConfig,
    callback: Option<ArrivalCallback>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    counters: Arc<Counters>,
    task: Option<JoinHandle<()>>,
}

impl ArrivalChannel {
    pub fn new(transport: Arc<dyn PushTransport>, config: ChannelConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            config,
            callback: None,
            state_tx: Arc::new(state_tx),
            counters: Arc::new(Counters::default()),
            task: None,
        }
    }

    /// Registers the arrival callback, replacing any previous one.
    ///
    /// Takes effect on the next `start()`.
    pub fn on_arrival<F>(&mut self, callback: F)
    where
        F: Fn(ArrivalEvent) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn stats(&self) -> ChannelStats {
        self.counters.snapshot()
    }

    /// Read-only view of state and counters that outlives borrows of the channel.
    pub fn monitor(&self) -> ChannelMonitor {
        ChannelMonitor {
            state: self.state_tx.subscribe(),
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts the connect/join/read loop. A second call while running is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let callback = self
            .callback
            .clone()
            .ok_or_else(|| QueueCallError::Other("arrival callback not registered".to_string()))?;

        let task = tokio::spawn(run_channel(
            Arc::clone(&self.transport),
            self.config.clone(),
            callback,
            Arc::clone(&self.state_tx),
            Arc::clone(&self.counters),
        ));
        self.task = Some(task);
        Ok(())
    }

    /// Unsubscribes and waits for the loop to exit.
    ///
    /// Once this returns the callback is never invoked again.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                tracing::error!(error = %e, "arrival channel task failed");
            }
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

impl Drop for ArrivalChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_channel(
    transport: Arc<dyn PushTransport>,
    config: ChannelConfig,
    callback: ArrivalCallback,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    counters: Arc<Counters>,
) {
    let mut backoff = Backoff::new(config.reconnect_initial, config.reconnect_max);
    let endpoint = transport.endpoint();

    loop {
        state_tx.send_replace(ConnectionState::Connecting);
        let mut joined = false;

        match run_session(
            transport.as_ref(),
            &config.room,
            &callback,
            &state_tx,
            &counters,
            &mut joined,
        )
        .await
        {
            Ok(()) => tracing::info!(endpoint = %endpoint, "push server closed the connection"),
            Err(e) => tracing::warn!(endpoint = %endpoint, error = %e, "push channel dropped"),
        }

        state_tx.send_replace(ConnectionState::Disconnected);
        if joined {
            backoff.reset();
        }
        let delay = backoff.next_delay();
        tracing::debug!(delay_ms = delay.as_millis() as u64, "reconnecting after delay");
        tokio::time::sleep(delay).await;
    }
}

async fn run_session(
    transport: &dyn PushTransport,
    room: &str,
    callback: &ArrivalCallback,
    state_tx: &watch::Sender<ConnectionState>,
    counters: &Counters,
    joined: &mut bool,
) -> Result<()> {
    let mut connection = transport.connect().await?;
    // Every (re)connect needs a fresh join; the callback stays registered once
    connection.join(room).await?;
    *joined = true;
    counters.sessions.fetch_add(1, Ordering::Relaxed);
    state_tx.send_replace(ConnectionState::Connected);
    tracing::info!(room = room, "joined push room");

    while let Some(payload) = connection.next_payload().await? {
        match ArrivalEvent::from_payload(&payload) {
            Ok(event) => {
                counters.received.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(identifier = %event.identifier, "arrival received");
                callback(event);
            }
            Err(e) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, payload = %payload, "dropping malformed arrival");
            }
        }
    }
    Ok(())
}
