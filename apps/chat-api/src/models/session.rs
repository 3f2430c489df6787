use chrono::{DateTime, Utc};
use serde::Serialize;

use murmur_common::id::{prefix, prefixed_ulid};

/// A login session tied to one access token. Revoking it deactivates the
/// record and force-disconnects any live gateway connection using the
/// token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub device: String,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: &str, token: &str) -> Self {
        let now = Utc::now();
        Self {
            id: prefixed_ulid(prefix::SESSION),
            user_id: user_id.to_string(),
            token: token.to_string(),
            device: "unknown".to_string(),
            is_active: true,
            last_activity: now,
            created_at: now,
        }
    }
}
