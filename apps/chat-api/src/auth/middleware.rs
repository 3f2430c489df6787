//! Bearer-token extraction middleware for the HTTP surface.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::tokens;
use crate::db::store::ChatStore;
use crate::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <token>`
/// header. Carries the presented token so handlers can tell the current
/// session apart from the user's other sessions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub token: String,
}

/// Rejection returned when the bearer token is missing or invalid.
pub struct AuthError {
    message: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.message
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError {
                message: "Missing Authorization header",
            })?;

        let token = header.strip_prefix("Bearer ").ok_or(AuthError {
            message: "Invalid Authorization header format",
        })?;

        let claims = tokens::verify_token(&state.config.jwt_secret, token).map_err(|_| {
            AuthError {
                message: "Invalid or expired token",
            }
        })?;

        let user = state
            .store
            .find_user(&claims.sub)
            .await
            .map_err(|_| AuthError {
                message: "User lookup failed",
            })?
            .ok_or(AuthError {
                message: "Invalid or expired token",
            })?;

        // Touch (or create) the session record for this token so session
        // management always sees current activity.
        if let Err(err) = state.store.find_or_create_session(&user.id, token).await {
            tracing::warn!(%err, user_id = %user.id, "failed to touch session");
        }

        Ok(AuthUser {
            user_id: user.id,
            token: token.to_string(),
        })
    }
}
