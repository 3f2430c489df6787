//! Per-connection gateway session state.

use super::events::{Outbound, OutboundEvent};
use super::registry::{OutboundSender, RegisteredConnection};

/// State for a single authenticated WebSocket connection. Identity is
/// attached once, at handshake time, and never changes for the
/// connection's lifetime.
pub struct GatewaySession {
    /// Unique connection identifier (`gw_`-prefixed ULID).
    pub connection_id: String,
    /// Authenticated user ID.
    pub user_id: String,
    /// Username snapshot taken at authentication time.
    pub username: String,
    /// The credential the connection authenticated with.
    pub credential: String,
    /// Writer half: events pushed here reach this connection's socket.
    pub sender: OutboundSender,
}

impl GatewaySession {
    /// Push an event to this connection's own socket.
    pub fn emit(&self, event: OutboundEvent) {
        let _ = self.sender.send(Outbound::Event(event));
    }

    /// Registry handle for this connection.
    pub fn connection(&self) -> RegisteredConnection {
        RegisteredConnection {
            connection_id: self.connection_id.clone(),
            user_id: self.user_id.clone(),
            sender: self.sender.clone(),
        }
    }
}
