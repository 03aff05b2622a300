//! Inbound message type handed from a transport to the dispatcher.

use serde::{Deserialize, Serialize};

/// A single inbound message, reduced to what dispatch needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Provider message ID (needed for read receipts and typing signals)
    pub id: String,
    /// Stable identifier of the conversation partner
    pub sender: String,
    /// Group conversations never enter the funnel
    #[serde(default)]
    pub is_group: bool,
    /// Raw text body; empty for non-text payloads
    #[serde(default)]
    pub body: String,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
}

impl InboundMessage {
    /// Build a direct-chat text message stamped with the current time.
    pub fn text(
        id: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            is_group: false,
            body: body.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
