//! Abstraction over the durable chat store used for users, messages,
//! conversations, groups, notifications, and sessions.
//!
//! Backed by a document database in production and an in-memory map in
//! tests; the gateway only ever talks to the trait.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::models::conversation::Conversation;
use crate::models::group::Group;
use crate::models::message::Message;
use crate::models::notification::Notification;
use crate::models::session::Session;
use crate::models::user::{PresenceStatus, User};

/// A failed store operation. Treated as transient by callers: writes that
/// must not drop a message are retried before the error is surfaced.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.message)
    }
}

impl std::error::Error for StoreError {}

#[async_trait]
pub trait ChatStore: Send + Sync {
    // Users
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: User) -> Result<(), StoreError>;
    async fn update_user_presence(
        &self,
        user_id: &str,
        status: PresenceStatus,
        last_connection: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // Messages
    async fn create_message(&self, message: Message) -> Result<Message, StoreError>;
    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, StoreError>;
    /// Full-document save of an already-created message.
    async fn update_message(&self, message: &Message) -> Result<(), StoreError>;

    // Conversations
    async fn find_or_create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, StoreError>;
    async fn find_conversation_between(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>, StoreError>;
    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), StoreError>;

    // Groups
    async fn find_group(&self, group_id: &str) -> Result<Option<Group>, StoreError>;
    async fn insert_group(&self, group: Group) -> Result<(), StoreError>;
    async fn update_group(&self, group: &Group) -> Result<(), StoreError>;

    // Notifications
    async fn create_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, StoreError>;

    // Sessions
    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;
    async fn find_session_by_token(&self, token: &str) -> Result<Option<Session>, StoreError>;
    /// Find the session for `token`, reactivating and touching it, or
    /// create a fresh one.
    async fn find_or_create_session(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Session, StoreError>;
    async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError>;
    async fn update_session(&self, session: &Session) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (single-process backend and test double)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    messages: Mutex<HashMap<String, Message>>,
    conversations: Mutex<HashMap<String, Conversation>>,
    groups: Mutex<HashMap<String, Group>>,
    notifications: Mutex<HashMap<String, Notification>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().get(user_id).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        self.users.lock().insert(user.id.clone(), user);
        Ok(())
    }

    async fn update_user_presence(
        &self,
        user_id: &str,
        status: PresenceStatus,
        last_connection: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.users.lock().get_mut(user_id) {
            user.status = status;
            user.last_connection = Some(last_connection);
        }
        Ok(())
    }

    async fn create_message(&self, message: Message) -> Result<Message, StoreError> {
        self.messages
            .lock()
            .insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, StoreError> {
        Ok(self.messages.lock().get(message_id).cloned())
    }

    async fn update_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages
            .lock()
            .insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn find_or_create_conversation(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Conversation, StoreError> {
        let mut conversations = self.conversations.lock();
        if let Some(existing) = conversations
            .values()
            .find(|c| c.is_between(user_a, user_b))
        {
            return Ok(existing.clone());
        }
        let conversation = Conversation::new(user_a, user_b);
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation_between(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .conversations
            .lock()
            .values()
            .find(|c| c.is_between(user_a, user_b))
            .cloned())
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.conversations
            .lock()
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn find_group(&self, group_id: &str) -> Result<Option<Group>, StoreError> {
        Ok(self.groups.lock().get(group_id).cloned())
    }

    async fn insert_group(&self, group: Group) -> Result<(), StoreError> {
        self.groups.lock().insert(group.id.clone(), group);
        Ok(())
    }

    async fn update_group(&self, group: &Group) -> Result<(), StoreError> {
        self.groups.lock().insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn create_notification(
        &self,
        notification: Notification,
    ) -> Result<Notification, StoreError> {
        self.notifications
            .lock()
            .insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn find_session_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn find_or_create_session(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.values_mut().find(|s| s.token == token) {
            existing.is_active = true;
            existing.last_activity = Utc::now();
            return Ok(existing.clone());
        }
        let session = Session::new(user_id, token);
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_session(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_conversation_is_order_independent() {
        let store = MemoryStore::new();

        let first = store
            .find_or_create_conversation("usr_a", "usr_b")
            .await
            .unwrap();
        let second = store
            .find_or_create_conversation("usr_b", "usr_a")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn update_conversation_persists_counters() {
        let store = MemoryStore::new();

        let mut conversation = store
            .find_or_create_conversation("usr_a", "usr_b")
            .await
            .unwrap();
        conversation.increment_unread("usr_b");
        store.update_conversation(&conversation).await.unwrap();

        let reloaded = store
            .find_conversation_between("usr_a", "usr_b")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.unread_for("usr_b"), 1);
    }

    #[tokio::test]
    async fn find_or_create_session_reactivates_existing_token() {
        let store = MemoryStore::new();

        let session = store
            .find_or_create_session("usr_a", "token-1")
            .await
            .unwrap();

        let mut deactivated = session.clone();
        deactivated.is_active = false;
        store.update_session(&deactivated).await.unwrap();

        let again = store
            .find_or_create_session("usr_a", "token-1")
            .await
            .unwrap();
        assert_eq!(again.id, session.id);
        assert!(again.is_active);
    }

    #[tokio::test]
    async fn update_user_presence_is_a_noop_for_unknown_users() {
        let store = MemoryStore::new();
        store
            .update_user_presence("usr_missing", PresenceStatus::Online, Utc::now())
            .await
            .unwrap();
        assert!(store.find_user("usr_missing").await.unwrap().is_none());
    }
}
