use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use murmur_common::id::{prefix, prefixed_ulid};

/// A 1:1 conversation between an unordered pair of users.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    /// The two participants, stored sorted so the pair has one identity
    /// regardless of who messaged first.
    pub participants: [String; 2],
    pub last_message_id: Option<String>,
    /// Per-participant count of messages not yet marked read.
    pub unread_counts: HashMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_a: &str, user_b: &str) -> Self {
        let participants = Self::participant_pair(user_a, user_b);
        let mut unread_counts = HashMap::new();
        unread_counts.insert(participants[0].clone(), 0);
        unread_counts.insert(participants[1].clone(), 0);
        Self {
            id: prefixed_ulid(prefix::CONVERSATION),
            participants,
            last_message_id: None,
            unread_counts,
            created_at: Utc::now(),
        }
    }

    /// Canonical sorted pair used to identify the conversation.
    pub fn participant_pair(user_a: &str, user_b: &str) -> [String; 2] {
        let mut pair = [user_a.to_string(), user_b.to_string()];
        pair.sort();
        pair
    }

    pub fn is_between(&self, user_a: &str, user_b: &str) -> bool {
        self.participants == Self::participant_pair(user_a, user_b)
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        self.unread_counts.get(user_id).copied().unwrap_or(0)
    }

    pub fn increment_unread(&mut self, user_id: &str) {
        *self.unread_counts.entry(user_id.to_string()).or_insert(0) += 1;
    }

    /// Decrement the user's unread count, flooring at zero.
    pub fn decrement_unread(&mut self, user_id: &str) {
        let count = self.unread_counts.entry(user_id.to_string()).or_insert(0);
        *count = count.saturating_sub(1);
    }
}
