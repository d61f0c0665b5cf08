use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as it travels over the room WebSocket.
///
/// Clients send only `roomId`, `body` and `timestamp`; the server stamps
/// `userId` and `username` before relaying to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Outbound message stamped with the current time.
    pub fn outbound(room_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: None,
            username: None,
            body: body.into(),
            timestamp: Utc::now(),
        }
    }

    /// Name to show for the author, falling back to the user id.
    pub fn author(&self) -> &str {
        self.username
            .as_deref()
            .or(self.user_id.as_deref())
            .unwrap_or("anonymous")
    }
}
