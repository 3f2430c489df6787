//! Session management endpoints.
//!
//! Revoking a session deactivates its record and, through the gateway's
//! revocation bridge, immediately terminates any live connection
//! authenticated with its token, rather than waiting for token expiry.

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::store::ChatStore;
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).delete(revoke_other_sessions))
        .route("/sessions/{session_id}", delete(revoke_session))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub id: String,
    pub device: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Whether this is the session the request authenticated with.
    pub current: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokedResponse {
    pub message: String,
}

// ---------------------------------------------------------------------------
// GET /api/v1/sessions
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Active sessions, most recent first", body = SessionListResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_sessions(
    AuthUser { user_id, token }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let mut sessions = state.store.sessions_for_user(&user_id).await?;
    sessions.retain(|s| s.is_active);
    sessions.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

    let sessions = sessions
        .into_iter()
        .map(|s| SessionInfo {
            current: s.token == token,
            id: s.id,
            device: s.device,
            last_activity: s.last_activity,
            created_at: s.created_at,
        })
        .collect();

    Ok(Json(SessionListResponse { sessions }))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/sessions/{session_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}",
    tag = "Sessions",
    security(("bearer" = [])),
    params(
        ("session_id" = String, Path, description = "Session ID"),
    ),
    responses(
        (status = 200, description = "Session revoked", body = RevokedResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 404, description = "Session not found or already inactive", body = ApiErrorBody),
    ),
)]
pub async fn revoke_session(
    AuthUser { user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<RevokedResponse>, ApiError> {
    let mut session = state
        .store
        .find_session(&session_id)
        .await?
        .filter(|s| s.user_id == user_id && s.is_active)
        .ok_or_else(|| ApiError::not_found("Session not found or already inactive"))?;

    session.is_active = false;
    state.store.update_session(&session).await?;

    state.gateway.disconnect_by_credential(&session.token);

    Ok(Json(RevokedResponse {
        message: "Session revoked successfully".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/sessions
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/sessions",
    tag = "Sessions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All other sessions revoked", body = RevokedResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn revoke_other_sessions(
    AuthUser { user_id, token }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<RevokedResponse>, ApiError> {
    let sessions = state.store.sessions_for_user(&user_id).await?;

    for mut session in sessions {
        if !session.is_active || session.token == token {
            continue;
        }
        session.is_active = false;
        state.store.update_session(&session).await?;
        state.gateway.disconnect_by_credential(&session.token);
    }

    Ok(Json(RevokedResponse {
        message: "All other sessions revoked successfully".to_string(),
    }))
}
