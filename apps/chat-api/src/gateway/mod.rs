//! Real-time core: connection registry, typing coordination, event
//! routing, and the session-revocation bridge.

pub mod events;
pub mod handler;
pub mod registry;
pub mod retry;
pub mod server;
pub mod session;
pub mod typing;

use std::sync::Arc;
use std::time::Duration;

use crate::db::store::ChatStore;

use events::{EventName, OutboundEvent};
use registry::ConnectionRegistry;
use retry::RetryPolicy;
use typing::TypingCoordinator;

/// Composition root for the real-time core. Constructed once at startup
/// (and fresh per test), shared behind an `Arc`, and injected into
/// handlers; the registry and typing map are never ambient state.
pub struct Gateway {
    pub store: Arc<dyn ChatStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub typing: TypingCoordinator,
    pub retry: RetryPolicy,
}

impl Gateway {
    pub fn new(store: Arc<dyn ChatStore>, typing_window: Duration) -> Self {
        Self {
            store,
            registry: Arc::new(ConnectionRegistry::new()),
            typing: TypingCoordinator::with_window(typing_window),
            retry: RetryPolicy::default(),
        }
    }

    /// Session revocation bridge: force-disconnect the live connection
    /// authenticated with `credential`, if any. The connection receives a
    /// `session-revoked` event before its socket is closed. Returns
    /// whether a connection was found.
    pub fn disconnect_by_credential(&self, credential: &str) -> bool {
        let Some(connection) = self.registry.resolve_by_credential(credential) else {
            return false;
        };
        tracing::info!(
            connection_id = %connection.connection_id,
            user_id = %connection.user_id,
            "forcing disconnect for revoked session"
        );
        connection.emit(OutboundEvent::new(
            EventName::SESSION_REVOKED,
            serde_json::json!({}),
        ));
        connection.close();
        true
    }
}
