use chrono::{DateTime, Utc};
use serde::Serialize;

use murmur_common::id::{prefix, prefixed_ulid};

/// Preview length for message notifications, in characters.
const PREVIEW_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Message,
    MessageRead,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message_id: String,
    /// Truncated content preview, present for message notifications.
    pub content: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: &str,
        sender_id: &str,
        kind: NotificationKind,
        message_id: &str,
        content: Option<&str>,
    ) -> Self {
        Self {
            id: prefixed_ulid(prefix::NOTIFICATION),
            recipient_id: recipient_id.to_string(),
            sender_id: sender_id.to_string(),
            kind,
            message_id: message_id.to_string(),
            content: content.map(preview),
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// First `PREVIEW_LEN` characters, safe on multi-byte boundaries.
fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_content() {
        let long = "x".repeat(500);
        let notification = Notification::new(
            "usr_b",
            "usr_a",
            NotificationKind::Message,
            "msg_1",
            Some(&long),
        );
        assert_eq!(notification.content.unwrap().chars().count(), 100);
    }

    #[test]
    fn preview_handles_multibyte_content() {
        let emoji = "🎉".repeat(200);
        let notification = Notification::new(
            "usr_b",
            "usr_a",
            NotificationKind::Message,
            "msg_1",
            Some(&emoji),
        );
        assert_eq!(notification.content.unwrap().chars().count(), 100);
    }
}
