//! Gateway wire frames: inbound client events, outbound server events,
//! and the typed payloads carried by each.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::MessageKind;

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A frame received from the client: an event name plus a JSON payload.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// A frame sent to the client.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEvent {
    pub event: String,
    pub data: Value,
}

impl OutboundEvent {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// Build an `error` event. `context` names the operation that failed.
    pub fn error(message: impl Into<String>, context: &str, can_retry: bool) -> Self {
        let message: String = message.into();
        Self::new(
            EventName::ERROR,
            serde_json::json!({
                "message": message,
                "context": context,
                "canRetry": can_retry,
            }),
        )
    }
}

/// A message pushed to a connection's writer half.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(OutboundEvent),
    /// Terminate the connection after flushing (forced disconnect).
    Close,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(rename = "mediaUrl", default)]
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendGroupMessagePayload {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(rename = "mediaUrl", default)]
    pub media_url: Option<String>,
    #[serde(rename = "replyTo", default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageReadPayload {
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypingPayload {
    #[serde(default)]
    pub recipient_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserStatusPayload {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupRoomPayload {
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReactionPayload {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessagePayload {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessagePayload {
    #[serde(default)]
    pub message_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Outbound event names
// ---------------------------------------------------------------------------

/// Event names dispatched to clients.
pub struct EventName;

impl EventName {
    pub const MESSAGE_SENT: &'static str = "message-sent";
    pub const NEW_MESSAGE: &'static str = "new-message";
    pub const NOTIFICATION: &'static str = "notification";
    pub const MESSAGE_READ_CONFIRMATION: &'static str = "message-read-confirmation";
    pub const USER_TYPING: &'static str = "user-typing";
    pub const USER_STOP_TYPING: &'static str = "user-stop-typing";
    pub const USER_STATUS: &'static str = "user-status";
    pub const NEW_GROUP_MESSAGE: &'static str = "new-group-message";
    pub const REACTION_ADDED: &'static str = "reaction-added";
    pub const REACTION_REMOVED: &'static str = "reaction-removed";
    pub const MESSAGE_EDITED: &'static str = "message-edited";
    pub const MESSAGE_DELETED: &'static str = "message-deleted";
    pub const USER_ONLINE: &'static str = "user-online";
    pub const USER_OFFLINE: &'static str = "user-offline";
    pub const SESSION_REVOKED: &'static str = "session-revoked";
    pub const ERROR: &'static str = "error";
}
