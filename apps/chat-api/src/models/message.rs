use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum message content length in characters.
pub const MAX_CONTENT_LEN: usize = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// A single user's reaction to a message. At most one per user; reacting
/// again with a different emoji replaces it.
#[derive(Debug, Clone, Serialize)]
pub struct Reaction {
    #[serde(rename = "user")]
    pub user_id: String,
    pub emoji: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A direct or group message. Exactly one of `recipient_id` / `group_id`
/// is set.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "sender")]
    pub sender_id: String,
    #[serde(rename = "recipient")]
    pub recipient_id: Option<String>,
    #[serde(rename = "group")]
    pub group_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    #[serde(rename = "mediaUrl")]
    pub media_url: Option<String>,
    #[serde(rename = "replyTo")]
    pub reply_to: Option<String>,
    pub reactions: Vec<Reaction>,
    pub status: MessageStatus,
    pub edited: bool,
    #[serde(rename = "editedAt")]
    pub edited_at: Option<DateTime<Utc>>,
    /// Soft delete: the flag is set, the content stays.
    pub deleted: bool,
    #[serde(rename = "deletedAt")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_direct(&self) -> bool {
        self.recipient_id.is_some()
    }

    /// The caller's existing reaction, if any.
    pub fn reaction_of(&self, user_id: &str) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_reactions(reactions: Vec<Reaction>) -> Message {
        Message {
            id: "msg_1".to_string(),
            sender_id: "usr_a".to_string(),
            recipient_id: Some("usr_b".to_string()),
            group_id: None,
            kind: MessageKind::Text,
            content: "hi".to_string(),
            media_url: None,
            reply_to: None,
            reactions,
            status: MessageStatus::Sent,
            edited: false,
            edited_at: None,
            deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reaction_of_finds_callers_reaction() {
        let message = message_with_reactions(vec![Reaction {
            user_id: "usr_b".to_string(),
            emoji: "👍".to_string(),
            created_at: Utc::now(),
        }]);
        assert_eq!(message.reaction_of("usr_b").unwrap().emoji, "👍");
        assert!(message.reaction_of("usr_a").is_none());
    }

    #[test]
    fn wire_format_uses_source_field_names() {
        let message = message_with_reactions(vec![]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["sender"], "usr_a");
        assert_eq!(value["recipient"], "usr_b");
        assert_eq!(value["type"], "text");
        assert!(value.get("mediaUrl").is_some());
        assert!(value.get("sender_id").is_none());
    }
}
