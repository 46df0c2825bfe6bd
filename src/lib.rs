//! queuecall - Live call terminal for pharmacy and clinic queues
//!
//! Push arrivals and polled clinic status become FIFO voice announcements
//! and a public display board.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod arrival;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod display;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod output;
pub mod poll;
pub mod sequencer;
pub mod speech;

// Composition root - needs everything
pub mod terminal;

// Core traits (source -> announce -> speak)
pub use arrival::transport::PushTransport;
pub use poll::PollSource;
pub use sequencer::AnnouncementObserver;
pub use speech::SpeechOutput;

// Pipeline pieces
pub use arrival::{ArrivalChannel, ArrivalEvent, CallSource, ConnectionState};
pub use display::{Display, DisplaySnapshot};
pub use sequencer::{Sequencer, SequencerConfig, SequencerHandle};
pub use terminal::Terminal;

// Error handling
pub use error::{QueueCallError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.0.1+abc1234"` when git hash is available, `"0.0.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
