use crate::arrival::ChannelConfig;
use crate::defaults;
use crate::display::DisplayConfig;
use crate::error::{QueueCallError, Result};
use crate::logging;
use crate::poll::{PollConfig, ScrollConfig};
use crate::sequencer::{PhraseBook, SequencerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelSection,
    pub speech: SpeechSection,
    pub display: DisplaySection,
    pub poll: PollSection,
    pub scroll: ScrollSection,
    pub logging: LoggingSection,
    pub control: ControlSection,
}

/// Push channel (pharmacy arrivals)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelSection {
    /// `host:port` of the push server.
    pub address: String,
    pub room: String,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
}

/// Speech engine selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpeechEngine {
    /// External synthesizer process.
    Command,
    /// Log only; for setups without audio.
    Silent,
}

/// Speech output and announcement pacing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechSection {
    pub engine: SpeechEngine,
    pub command: String,
    pub args: Vec<String>,
    pub cooldown_ms: u64,
    pub timeout_ms: u64,
    pub spell_identifier: bool,
    pub pharmacy_template: String,
    pub clinic_template: String,
}

/// Public display lists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplaySection {
    pub waiting_capacity: usize,
    pub history_capacity: usize,
    /// Redraw the board on stdout after every change.
    pub render: bool,
}

/// Clinic queue polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSection {
    pub enabled: bool,
    pub status_url: String,
    pub roster_url: String,
    pub interval_secs: u64,
    pub timeout_ms: u64,
}

/// Roster auto-scroll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrollSection {
    pub enabled: bool,
    pub tick_ms: u64,
    pub step_rows: usize,
    pub pause_ms: u64,
    pub viewport_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

/// Local control socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ControlSection {
    /// Overrides the runtime-dir socket path.
    pub socket_path: Option<PathBuf>,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            address: defaults::CHANNEL_ADDRESS.to_string(),
            room: defaults::PHARMACY_ROOM.to_string(),
            reconnect_initial_ms: defaults::RECONNECT_INITIAL_MS,
            reconnect_max_ms: defaults::RECONNECT_MAX_MS,
        }
    }
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            engine: SpeechEngine::Command,
            command: defaults::SPEECH_COMMAND.to_string(),
            args: vec!["-v".to_string(), defaults::SPEECH_VOICE.to_string()],
            cooldown_ms: defaults::COOLDOWN_MS,
            timeout_ms: defaults::SPEECH_TIMEOUT_MS,
            spell_identifier: true,
            pharmacy_template: defaults::PHARMACY_TEMPLATE.to_string(),
            clinic_template: defaults::CLINIC_TEMPLATE.to_string(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            waiting_capacity: defaults::WAITING_CAPACITY,
            history_capacity: defaults::HISTORY_CAPACITY,
            render: true,
        }
    }
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            enabled: false,
            status_url: String::new(),
            roster_url: String::new(),
            interval_secs: defaults::POLL_INTERVAL_SECS,
            timeout_ms: defaults::POLL_TIMEOUT_MS,
        }
    }
}

impl Default for ScrollSection {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_ms: defaults::SCROLL_TICK_MS,
            step_rows: defaults::SCROLL_STEP_ROWS,
            pause_ms: defaults::SCROLL_PAUSE_MS,
            viewport_rows: defaults::SCROLL_VIEWPORT_ROWS,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: defaults::LOG_FORMAT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. A missing file is
    /// `ConfigFileNotFound`; invalid TOML is `Config`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                QueueCallError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                QueueCallError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(QueueCallError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - QUEUECALL_CHANNEL_ADDRESS → channel.address
    /// - QUEUECALL_ROOM → channel.room
    /// - QUEUECALL_LOG_LEVEL → logging.level
    /// - QUEUECALL_SPEECH_COMMAND → speech.command
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(address) = std::env::var("QUEUECALL_CHANNEL_ADDRESS")
            && !address.is_empty()
        {
            self.channel.address = address;
        }

        if let Ok(room) = std::env::var("QUEUECALL_ROOM")
            && !room.is_empty()
        {
            self.channel.room = room;
        }

        if let Ok(level) = std::env::var("QUEUECALL_LOG_LEVEL")
            && !level.is_empty()
        {
            self.logging.level = level;
        }

        if let Ok(command) = std::env::var("QUEUECALL_SPEECH_COMMAND")
            && !command.is_empty()
        {
            self.speech.command = command;
        }

        self
    }

    /// Checks values that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.channel.address)?;
        non_empty("channel.room", &self.channel.room)?;
        positive("channel.reconnect_initial_ms", self.channel.reconnect_initial_ms)?;
        if self.channel.reconnect_max_ms < self.channel.reconnect_initial_ms {
            return Err(invalid(
                "channel.reconnect_max_ms",
                "must not be smaller than reconnect_initial_ms",
            ));
        }

        if self.speech.engine == SpeechEngine::Command {
            non_empty("speech.command", &self.speech.command)?;
        }
        positive("speech.timeout_ms", self.speech.timeout_ms)?;

        positive("display.waiting_capacity", self.display.waiting_capacity as u64)?;
        positive("display.history_capacity", self.display.history_capacity as u64)?;

        if self.poll.enabled {
            non_empty("poll.status_url", &self.poll.status_url)?;
            non_empty("poll.roster_url", &self.poll.roster_url)?;
        }
        positive("poll.interval_secs", self.poll.interval_secs)?;
        positive("poll.timeout_ms", self.poll.timeout_ms)?;

        positive("scroll.tick_ms", self.scroll.tick_ms)?;
        positive("scroll.step_rows", self.scroll.step_rows as u64)?;
        positive("scroll.viewport_rows", self.scroll.viewport_rows as u64)?;

        if !logging::log_level_valid(&self.logging.level) {
            return Err(invalid(
                "logging.level",
                "expected one of trace, debug, info, warn, error",
            ));
        }
        if !logging::log_format_valid(&self.logging.format) {
            return Err(invalid("logging.format", "expected text or json"));
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/queuecall/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("queuecall")
            .join("config.toml")
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            room: self.channel.room.clone(),
            reconnect_initial: Duration::from_millis(self.channel.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(self.channel.reconnect_max_ms),
        }
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            cooldown: Duration::from_millis(self.speech.cooldown_ms),
            speech_timeout: Duration::from_millis(self.speech.timeout_ms),
            phrases: PhraseBook {
                pharmacy: self.speech.pharmacy_template.clone(),
                clinic: self.speech.clinic_template.clone(),
                spell_identifier: self.speech.spell_identifier,
            },
        }
    }

    pub fn display_config(&self) -> DisplayConfig {
        DisplayConfig {
            waiting_capacity: self.display.waiting_capacity,
            history_capacity: self.display.history_capacity,
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(self.poll.interval_secs),
        }
    }

    pub fn scroll_config(&self) -> ScrollConfig {
        ScrollConfig {
            tick: Duration::from_millis(self.scroll.tick_ms),
            step_rows: self.scroll.step_rows,
            pause: Duration::from_millis(self.scroll.pause_ms),
            viewport_rows: self.scroll.viewport_rows,
        }
    }
}

fn invalid(key: &str, message: &str) -> QueueCallError {
    QueueCallError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn positive(key: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(invalid(key, "must be greater than zero"));
    }
    Ok(())
}

fn non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(key, "must not be empty"));
    }
    Ok(())
}

fn validate_address(address: &str) -> Result<()> {
    let valid = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0));
    if !valid {
        return Err(invalid("channel.address", "expected host:port"));
    }
    Ok(())
}
