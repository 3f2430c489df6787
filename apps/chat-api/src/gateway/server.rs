//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use murmur_common::id::{prefix, prefixed_ulid};

use crate::auth::tokens;
use crate::db::store::ChatStore;
use crate::models::user::{PresenceStatus, User};
use crate::AppState;

use super::events::{ClientFrame, EventName, Outbound, OutboundEvent};
use super::handler;
use super::session::GatewaySession;
use super::Gateway;

/// Close code sent on forced disconnect (4000-range is
/// application-level).
const CLOSE_SESSION_REVOKED: u16 = 4003;

#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

/// Authenticates the presented credential before upgrading. Every failure
/// collapses into the same generic 401; the handshake itself is refused
/// and no gateway event is ever emitted.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> Response {
    let Some(token) = params.token else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let user = match authenticate(&state, &token).await {
        Ok(user) => user,
        Err(reason) => {
            tracing::debug!(%reason, "gateway handshake rejected");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, user, token))
        .into_response()
}

/// Resolve a credential to an active user record: well-formed, unexpired,
/// signature-valid token, mapping to an existing user.
async fn authenticate(state: &AppState, token: &str) -> Result<User, &'static str> {
    let claims = tokens::verify_token(&state.config.jwt_secret, token)
        .map_err(|_| "invalid or expired token")?;
    state
        .store
        .find_user(&claims.sub)
        .await
        .map_err(|_| "user lookup failed")?
        .ok_or("user not found")
}

async fn handle_connection(socket: WebSocket, state: AppState, user: User, token: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let session = Arc::new(GatewaySession {
        connection_id: prefixed_ulid(prefix::CONNECTION),
        user_id: user.id.clone(),
        username: user.username.clone(),
        credential: token,
        sender: tx,
    });

    let gateway = state.gateway.clone();
    gateway
        .registry
        .register(&session.credential, session.connection());

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "gateway session established"
    );

    // Durable presence write. A failure degrades last-seen data but must
    // not kill the connection.
    if let Err(err) = gateway
        .store
        .update_user_presence(&session.user_id, PresenceStatus::Online, Utc::now())
        .await
    {
        tracing::warn!(%err, user_id = %session.user_id, "failed to persist online presence");
    }

    gateway.registry.broadcast(&OutboundEvent::new(
        EventName::USER_ONLINE,
        serde_json::json!({
            "userId": session.user_id,
            "status": "online",
        }),
    ));

    // Frames from this connection are processed in arrival order; events
    // for it queue on the channel while a handler awaits.
    loop {
        tokio::select! {
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let frame: ClientFrame = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(_) => {
                                session.emit(OutboundEvent::error("Invalid frame", "parse", false));
                                continue;
                            }
                        };
                        handler::dispatch(&gateway, &session, frame).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(?err, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            outgoing = rx.recv() => {
                match outgoing {
                    Some(Outbound::Event(event)) => {
                        let json = serde_json::to_string(&event).unwrap();
                        if ws_tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let _ = ws_tx
                            .send(Message::Close(Some(CloseFrame {
                                code: CLOSE_SESSION_REVOKED,
                                reason: "Session revoked".into(),
                            })))
                            .await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    disconnect(&gateway, &session).await;
}

/// Disconnect lifecycle: unregister (which also clears room memberships),
/// drop the user's typing timers without firing them, persist offline
/// presence, and broadcast `user-offline`.
async fn disconnect(gateway: &Gateway, session: &GatewaySession) {
    gateway.registry.unregister(
        &session.user_id,
        &session.credential,
        &session.connection_id,
    );
    gateway.typing.clear_for_sender(&session.user_id);

    let last_connection = Utc::now();
    if let Err(err) = gateway
        .store
        .update_user_presence(&session.user_id, PresenceStatus::Offline, last_connection)
        .await
    {
        tracing::warn!(%err, user_id = %session.user_id, "failed to persist offline presence");
    }

    gateway.registry.broadcast(&OutboundEvent::new(
        EventName::USER_OFFLINE,
        serde_json::json!({
            "userId": session.user_id,
            "status": "offline",
            "lastConnection": last_connection,
        }),
    ));

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "gateway session ended"
    );
}
