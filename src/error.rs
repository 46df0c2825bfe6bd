//! Error types for queuecall.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueCallError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Push channel errors
    #[error("Push channel connection failed: {message}")]
    ChannelConnection { message: String },

    #[error("Room join failed for '{room}': {message}")]
    ChannelJoin { room: String, message: String },

    #[error("Push channel protocol error: {message}")]
    ChannelProtocol { message: String },

    // Speech errors
    #[error("Speech engine not found: {engine}")]
    SpeechEngineNotFound { engine: String },

    #[error("Speech output failed: {message}")]
    SpeechFailed { message: String },

    // Announcement sequencer errors
    #[error("Announcement sequencer is no longer running")]
    SequencerClosed,

    // Live poll errors
    #[error("Queue poll failed: {message}")]
    Poll { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, QueueCallError>;
