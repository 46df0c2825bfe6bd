//! JSON line protocol spoken with the push channel server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by the terminal to the push server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Subscribe to a room. The server treats repeated joins as a no-op.
    Join { room: String },
    /// Keepalive answer.
    Pong,
}

impl ClientFrame {
    /// Serialize frame to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize frame from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Frames pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Join acknowledgement.
    Joined { room: String },
    /// Keepalive probe.
    Ping,
    /// Room message; the payload is validated by the channel adapter.
    Message {
        #[serde(default)]
        room: Option<String>,
        payload: Value,
    },
    /// Server-side failure report.
    Error { message: String },
}

impl ServerFrame {
    /// Serialize frame to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize frame from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
