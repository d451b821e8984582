//! Application message schema carried in text frames.
//!
//! The schema is a flat, internally-tagged JSON object; serde_json gives us
//! strict parsing and correct escaping of `"`, `\` and control characters
//! in both directions.

use serde::{Deserialize, Serialize};

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// `{"type":"join","username":"<string>"}`
    Join { username: String },
    /// `{"type":"message","content":"<string>"}`
    Message { content: String },
}

impl ClientMessage {
    /// Parse a text frame payload. Unrecognized or malformed payloads are
    /// an `Err` the dispatch layer logs and ignores.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Broadcast of a chat message.
    Message {
        username: String,
        content: String,
        /// RFC 3339 UTC timestamp.
        timestamp: String,
    },
    /// Join/leave notification.
    Notification { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}
