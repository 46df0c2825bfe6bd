//! Terminal mode: wires the push channel, display, sequencer, clinic poller
//! and control socket together and owns orderly shutdown.

pub mod handler;

use crate::arrival::channel::{ArrivalChannel, ChannelMonitor, ConnectionState};
use crate::arrival::event::CallSource;
use crate::arrival::transport::{PushTransport, TcpTransport};
use crate::config::{Config, SpeechEngine};
use crate::display::{Display, DisplaySnapshot};
use crate::error::{QueueCallError, Result};
use crate::ipc::protocol::TerminalStatus;
use crate::ipc::server::IpcServer;
use crate::output::{self, BoardView};
use crate::poll::{AutoScroller, ClinicBoard, PollHandle, PollSource, PollSupervisor};
use crate::sequencer::{Sequencer, SequencerHandle};
use crate::speech::{CommandSpeech, SilentSpeech, SpeechOutput};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

/// Cloneable read side of a running terminal, shared with the control handler.
#[derive(Clone)]
pub struct TerminalView {
    channel: ChannelMonitor,
    sequencer: SequencerHandle,
    display: watch::Receiver<DisplaySnapshot>,
    board: Option<watch::Receiver<ClinicBoard>>,
    scroller: Option<Arc<AutoScroller>>,
    shutdown: Arc<Notify>,
}

impl TerminalView {
    pub fn status(&self) -> TerminalStatus {
        let sequencer = self.sequencer.status();
        TerminalStatus {
            connection: self.channel.connection_state(),
            channel: self.channel.stats(),
            phase: sequencer.phase,
            queued: sequencer.queued,
            announced: sequencer.announced,
            failed: sequencer.failed,
            display: self.display.borrow().clone(),
            board: self.board.as_ref().map(|b| b.borrow().clone()),
            auto_scroll: self.scroller.as_ref().map(|s| s.is_enabled()),
        }
    }

    /// Toggles roster auto-scroll. Fails when clinic polling is off.
    pub fn set_auto_scroll(&self, enabled: bool) -> Result<()> {
        let scroller = self.scroller.as_ref().ok_or_else(|| {
            QueueCallError::Other("auto-scroll needs clinic polling ([poll] enabled)".to_string())
        })?;
        scroller.set_enabled(enabled);
        Ok(())
    }

    /// Asks the owner of the terminal to shut down.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Resolves once a shutdown was requested through [`TerminalView::request_shutdown`].
    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }
}

/// A running terminal.
pub struct Terminal {
    channel: ArrivalChannel,
    display: Display,
    sequencer: SequencerHandle,
    poll: Option<PollHandle>,
    view: TerminalView,
}

impl Terminal {
    /// Starts every component. Must be called inside a tokio runtime.
    ///
    /// `poll_source` enables the clinic board; the same sequencer serves both
    /// pharmacy arrivals and clinic serving changes.
    pub fn start(
        config: &Config,
        transport: Arc<dyn PushTransport>,
        speech: Arc<dyn SpeechOutput>,
        poll_source: Option<Arc<dyn PollSource>>,
    ) -> Result<Self> {
        let display = Display::spawn(config.display_config(), CallSource::Pharmacy);
        let feed = display.feed();

        let sequencer = Sequencer::new(config.sequencer_config())
            .with_observer(Arc::new(feed.clone()))
            .spawn(speech);

        let mut channel = ArrivalChannel::new(transport, config.channel_config());
        let pharmacy = sequencer.clone();
        channel.on_arrival(move |event| {
            // Display first: its channel must see the arrival before any completion
            feed.arrival(event.clone());
            if let Err(e) = pharmacy.enqueue(event) {
                tracing::warn!(error = %e, "arrival not queued");
            }
        });
        channel.start()?;

        let poll = poll_source.map(|source| {
            PollSupervisor::new(source, sequencer.clone(), config.poll_config()).start()
        });
        let scroller = poll.as_ref().map(|poll| {
            let scroller = Arc::new(AutoScroller::new(config.scroll_config(), poll.subscribe()));
            scroller.set_enabled(config.scroll.enabled);
            scroller
        });

        let view = TerminalView {
            channel: channel.monitor(),
            sequencer: sequencer.clone(),
            display: display.subscribe(),
            board: poll.as_ref().map(PollHandle::subscribe),
            scroller,
            shutdown: Arc::new(Notify::new()),
        };

        Ok(Self {
            channel,
            display,
            sequencer,
            poll,
            view,
        })
    }

    pub fn view(&self) -> TerminalView {
        self.view.clone()
    }

    pub fn status(&self) -> TerminalStatus {
        self.view.status()
    }

    pub fn sequencer(&self) -> &SequencerHandle {
        &self.sequencer
    }

    pub fn display(&self) -> DisplaySnapshot {
        self.display.snapshot()
    }

    /// Stops intake first, then speech, then the views.
    pub async fn shutdown(mut self) {
        self.channel.stop().await;
        if let Some(poll) = self.poll.take() {
            poll.stop().await;
        }
        if let Some(scroller) = &self.view.scroller {
            scroller.set_enabled(false);
        }
        self.sequencer.shutdown().await;
        self.display.stop().await;
        tracing::info!("terminal stopped");
    }
}

/// Builds the configured speech engine.
pub fn speech_from_config(config: &Config) -> Arc<dyn SpeechOutput> {
    match config.speech.engine {
        SpeechEngine::Command => Arc::new(CommandSpeech::new(
            config.speech.command.clone(),
            config.speech.args.clone(),
        )),
        SpeechEngine::Silent => Arc::new(SilentSpeech),
    }
}

/// Builds the clinic poll source, if enabled.
pub fn poll_source_from_config(config: &Config) -> Result<Option<Arc<dyn PollSource>>> {
    if !config.poll.enabled {
        return Ok(None);
    }

    #[cfg(feature = "http-poll")]
    {
        let source = crate::poll::HttpPollSource::new(
            config.poll.status_url.clone(),
            config.poll.roster_url.clone(),
            std::time::Duration::from_millis(config.poll.timeout_ms),
        )?;
        Ok(Some(Arc::new(source)))
    }

    #[cfg(not(feature = "http-poll"))]
    {
        tracing::warn!("clinic polling is enabled but this build lacks the http-poll feature");
        Ok(None)
    }
}

/// Redraws the board on every display, board, scroll or connection change.
fn spawn_renderer(
    view: TerminalView,
    mut connection: watch::Receiver<ConnectionState>,
    viewport_rows: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut display = view.display.clone();
        let mut board = view.board.clone();
        let mut offset = view.scroller.as_ref().map(|s| s.subscribe());

        loop {
            let snapshot = display.borrow_and_update().clone();
            let clinic = board.as_mut().map(|b| b.borrow_and_update().clone());
            let scroll_offset = offset.as_mut().map(|o| *o.borrow_and_update()).unwrap_or(0);
            let board_view = BoardView {
                connection: *connection.borrow_and_update(),
                display: &snapshot,
                clinic: clinic.as_ref(),
                scroll_offset,
                viewport_rows,
            };
            if let Err(e) = output::redraw(&board_view) {
                tracing::debug!(error = %e, "board redraw failed");
            }

            let board_changed = async {
                match board.as_mut() {
                    Some(b) => b.changed().await,
                    None => std::future::pending().await,
                }
            };
            let offset_changed = async {
                match offset.as_mut() {
                    Some(o) => o.changed().await,
                    None => std::future::pending().await,
                }
            };

            let result = tokio::select! {
                r = display.changed() => r,
                r = connection.changed() => r,
                r = board_changed => r,
                r = offset_changed => r,
            };
            if result.is_err() {
                break;
            }
        }
    })
}

/// Runs the terminal in the foreground until SIGINT, SIGTERM or a control
/// `shutdown` command.
pub async fn run_terminal(config: Config, socket_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    config.validate()?;

    let transport: Arc<dyn PushTransport> =
        Arc::new(TcpTransport::new(config.channel.address.clone()));
    let speech = speech_from_config(&config);
    let poll_source = poll_source_from_config(&config)?;

    if !quiet {
        eprintln!(
            "Connecting to {} (room '{}'), speech: {}",
            config.channel.address,
            config.channel.room,
            speech.engine_name()
        );
    }

    let terminal = Terminal::start(&config, transport, speech, poll_source)?;
    let view = terminal.view();

    let socket_path = socket_path
        .or_else(|| config.control.socket_path.clone())
        .unwrap_or_else(IpcServer::default_socket_path);
    let server = Arc::new(IpcServer::new(socket_path));
    let listener = server.bind()?;
    let server_task = {
        let server = Arc::clone(&server);
        let handler = handler::TerminalCommandHandler::new(view.clone());
        tokio::spawn(async move { server.serve(listener, handler).await })
    };

    if !quiet {
        eprintln!("Control socket: {}", server.socket_path().display());
    }

    let renderer = (config.display.render && !quiet).then(|| {
        spawn_renderer(
            view.clone(),
            terminal.channel.subscribe_state(),
            config.scroll.viewport_rows,
        )
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                tracing::error!(error = %e, "failed to set up SIGTERM handler");
            }
            tracing::info!("received SIGTERM, shutting down");
        }
        _ = view.shutdown_requested() => {
            tracing::info!("shutdown requested over control socket");
        }
    }

    if let Err(e) = server.stop() {
        tracing::warn!(error = %e, "control socket cleanup failed");
    }
    match server_task.await {
        Ok(Err(e)) => tracing::warn!(error = %e, "control socket failed"),
        Err(e) => tracing::error!(error = %e, "control socket task failed"),
        Ok(Ok(())) => {}
    }

    if let Some(renderer) = renderer {
        renderer.abort();
    }
    terminal.shutdown().await;

    if !quiet {
        eprintln!("Terminal stopped.");
    }
    Ok(())
}

/// Wait for SIGTERM (sent by systemd on stop).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| QueueCallError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}
