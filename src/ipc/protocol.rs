//! JSON message protocol for the local control socket.

use crate::arrival::channel::{ChannelStats, ConnectionState};
use crate::display::DisplaySnapshot;
use crate::poll::ClinicBoard;
use crate::sequencer::SequencerPhase;
use serde::{Deserialize, Serialize};

/// Commands sent by the CLI to a running terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get the terminal status
    Status,
    /// Turn roster auto-scroll on or off
    AutoScroll { enabled: bool },
    /// Shut the terminal down
    Shutdown,
}

impl Command {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Full terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalStatus {
    pub connection: ConnectionState,
    pub channel: ChannelStats,
    pub phase: SequencerPhase,
    pub queued: usize,
    pub announced: u64,
    pub failed: u64,
    pub display: DisplaySnapshot,
    /// Present when clinic polling is enabled.
    pub board: Option<ClinicBoard>,
    /// `None` when there is no roster to scroll.
    pub auto_scroll: Option<bool>,
}

/// Responses sent by the terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command succeeded
    Ok,
    Status(Box<TerminalStatus>),
    Error { message: String },
}

impl Response {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::event::ArrivalEvent;

    fn sample_status() -> TerminalStatus {
        let p1 = ArrivalEvent::pharmacy("P1", "Alice", "R1");
        TerminalStatus {
            connection: ConnectionState::Connected,
            channel: ChannelStats::default(),
            phase: SequencerPhase::Cooldown,
            queued: 2,
            announced: 7,
            failed: 1,
            display: DisplaySnapshot {
                current: Some(p1.clone()),
                waiting: vec![],
                history: vec![p1],
            },
            board: None,
            auto_scroll: Some(true),
        }
    }

    #[test]
    fn test_command_json_format_examples() {
        assert_eq!(Command::Status.to_json().unwrap(), r#"{"type":"status"}"#);
        assert_eq!(Command::Shutdown.to_json().unwrap(), r#"{"type":"shutdown"}"#);
        assert_eq!(
            Command::AutoScroll { enabled: false }.to_json().unwrap(),
            r#"{"type":"auto_scroll","enabled":false}"#
        );
    }

    #[test]
    fn test_command_parses_hand_written_json() {
        let cmd = Command::from_json(r#"{ "type": "auto_scroll", "enabled": true }"#).unwrap();
        assert_eq!(cmd, Command::AutoScroll { enabled: true });
    }

    #[test]
    fn test_invalid_command_json() {
        assert!(Command::from_json(r#"{"type": "toggle"}"#).is_err());
        assert!(Command::from_json(r#"{"type": "auto_scroll"}"#).is_err());
        assert!(Command::from_json(r#"{"invalid": "json"}"#).is_err());
        assert!(Command::from_json("not json at all").is_err());
    }

    #[test]
    fn test_response_status_json_shape() {
        let resp = Response::Status(Box::new(sample_status()));
        let json = resp.to_json().unwrap();
        assert!(json.starts_with(r#"{"type":"status""#), "{json}");
        assert!(json.contains(r#""connection":"connected""#));
        assert!(json.contains(r#""phase":{"state":"cooldown"}"#));
        assert!(json.contains(r#""auto_scroll":true"#));
        assert_eq!(Response::from_json(&json).unwrap(), resp);
    }

    #[test]
    fn test_response_ok_and_error_format() {
        assert_eq!(Response::Ok.to_json().unwrap(), r#"{"type":"ok"}"#);
        let json = Response::error("socket busy").to_json().unwrap();
        assert_eq!(json, r#"{"type":"error","message":"socket busy"}"#);
    }
}
