//! In-memory connection registry: which user is live on which connection,
//! which credential authenticated it, and which group rooms it joined.
//!
//! The registry keeps at most one connection per user (last writer wins)
//! and one per credential. It holds no persistent state and is rebuilt
//! from nothing on restart.

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::events::{Outbound, OutboundEvent};

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// A live, authenticated connection as seen by the registry.
#[derive(Clone)]
pub struct RegisteredConnection {
    pub connection_id: String,
    pub user_id: String,
    pub sender: OutboundSender,
}

impl RegisteredConnection {
    /// Push an event to this connection. Returns false if the connection's
    /// writer is already gone; callers treat that as a no-op.
    pub fn emit(&self, event: OutboundEvent) -> bool {
        self.sender.send(Outbound::Event(event)).is_ok()
    }

    /// Ask the connection's event loop to close the socket.
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

pub struct ConnectionRegistry {
    /// user id → most recent connection for that user.
    users: DashMap<String, RegisteredConnection>,
    /// credential token → the connection it authenticated.
    credentials: DashMap<String, RegisteredConnection>,
    /// group id → connections joined to the group's room.
    rooms: DashMap<String, Vec<RegisteredConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            credentials: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Insert or overwrite the entries for this connection. A user's
    /// earlier connection stays open but becomes unroutable.
    pub fn register(&self, credential: &str, connection: RegisteredConnection) {
        self.users
            .insert(connection.user_id.clone(), connection.clone());
        self.credentials.insert(credential.to_string(), connection);
    }

    /// The connection currently registered for a user, if any.
    pub fn resolve(&self, user_id: &str) -> Option<RegisteredConnection> {
        self.users.get(user_id).map(|c| c.value().clone())
    }

    /// Lookup by credential, used only for forced disconnection.
    pub fn resolve_by_credential(&self, credential: &str) -> Option<RegisteredConnection> {
        self.credentials.get(credential).map(|c| c.value().clone())
    }

    /// Remove this connection's entries and room memberships. Entries that
    /// a newer connection has already overwritten are left alone.
    pub fn unregister(&self, user_id: &str, credential: &str, connection_id: &str) {
        self.users
            .remove_if(user_id, |_, c| c.connection_id == connection_id);
        self.credentials
            .remove_if(credential, |_, c| c.connection_id == connection_id);
        self.leave_all_rooms(connection_id);
    }

    pub fn join_room(&self, group_id: &str, connection: RegisteredConnection) {
        let mut room = self.rooms.entry(group_id.to_string()).or_default();
        room.retain(|c| c.connection_id != connection.connection_id);
        room.push(connection);
    }

    pub fn leave_room(&self, group_id: &str, connection_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(group_id) {
            room.retain(|c| c.connection_id != connection_id);
        }
        self.rooms.remove_if(group_id, |_, room| room.is_empty());
    }

    pub fn leave_all_rooms(&self, connection_id: &str) {
        for mut room in self.rooms.iter_mut() {
            room.retain(|c| c.connection_id != connection_id);
        }
        self.rooms.retain(|_, room| !room.is_empty());
    }

    /// Emit to the user's registered connection, if any. Absent users are
    /// a no-op, not an error.
    pub fn emit_to_user(&self, user_id: &str, event: OutboundEvent) -> bool {
        match self.resolve(user_id) {
            Some(connection) => connection.emit(event),
            None => false,
        }
    }

    /// Emit to every connection in a group room, optionally excluding one
    /// (the actor, who already received a synchronous ack).
    pub fn emit_to_room(
        &self,
        group_id: &str,
        except_connection: Option<&str>,
        event: &OutboundEvent,
    ) {
        if let Some(room) = self.rooms.get(group_id) {
            for connection in room.iter() {
                if Some(connection.connection_id.as_str()) == except_connection {
                    continue;
                }
                connection.emit(event.clone());
            }
        }
    }

    /// Emit to every registered connection.
    pub fn broadcast(&self, event: &OutboundEvent) {
        for connection in self.users.iter() {
            connection.emit(event.clone());
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
