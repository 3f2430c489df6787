use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether a user currently holds a live gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub status: PresenceStatus,
    /// Last time the user connected or disconnected.
    pub last_connection: Option<DateTime<Utc>>,
    /// IDs of users this user has blocked.
    pub blocked_users: Vec<String>,
}

impl User {
    pub fn has_blocked(&self, user_id: &str) -> bool {
        self.blocked_users.iter().any(|id| id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_blocked_matches_only_listed_ids() {
        let user = User {
            id: "usr_a".to_string(),
            username: "a".to_string(),
            avatar_url: None,
            status: PresenceStatus::Offline,
            last_connection: None,
            blocked_users: vec!["usr_b".to_string()],
        };
        assert!(user.has_blocked("usr_b"));
        assert!(!user.has_blocked("usr_c"));
    }
}
