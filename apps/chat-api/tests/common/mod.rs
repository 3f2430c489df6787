use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use chat_api::auth::tokens::Claims;
use chat_api::config::Config;
use chat_api::db::store::{ChatStore, MemoryStore};
use chat_api::gateway::Gateway;
use chat_api::models::group::{Group, GroupMember, GroupRole, GroupSettings};
use chat_api::models::user::{PresenceStatus, User};
use chat_api::AppState;
use murmur_common::id::{prefix, prefixed_ulid};

pub const TEST_JWT_SECRET: &str = "test-secret-do-not-use-in-production";

/// Short typing window so tests don't wait out the production 3 s.
pub const TEST_TYPING_WINDOW: Duration = Duration::from_millis(100);

/// Build a fresh AppState with an empty in-memory store.
pub fn test_state() -> AppState {
    let config = Config {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        port: 0,
        typing_window_ms: TEST_TYPING_WINDOW.as_millis() as u64,
    };
    let store: Arc<dyn ChatStore> = Arc::new(MemoryStore::new());
    let gateway = Arc::new(Gateway::new(store.clone(), TEST_TYPING_WINDOW));
    AppState {
        config: Arc::new(config),
        store,
        gateway,
    }
}

/// Build the full router plus its backing state.
pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Seed a user and return it.
pub async fn seed_user(state: &AppState, username: &str) -> User {
    seed_user_with_blocks(state, username, &[]).await
}

/// Seed a user with a blocked-users list.
pub async fn seed_user_with_blocks(state: &AppState, username: &str, blocked: &[&str]) -> User {
    let user = User {
        id: prefixed_ulid(prefix::USER),
        username: username.to_string(),
        avatar_url: None,
        status: PresenceStatus::Offline,
        last_connection: None,
        blocked_users: blocked.iter().map(|id| id.to_string()).collect(),
    };
    state.store.insert_user(user.clone()).await.expect("seed user");
    user
}

/// Seed a group. The creator is always added with the creator role.
pub async fn seed_group(
    state: &AppState,
    name: &str,
    creator: &User,
    members: &[(&User, GroupRole)],
    only_admins_can_post: bool,
) -> Group {
    let now = Utc::now();
    let mut group_members = vec![GroupMember {
        user_id: creator.id.clone(),
        role: GroupRole::Creator,
        joined_at: now,
    }];
    for (user, role) in members {
        group_members.push(GroupMember {
            user_id: user.id.clone(),
            role: *role,
            joined_at: now,
        });
    }

    let group = Group {
        id: prefixed_ulid(prefix::GROUP),
        name: name.to_string(),
        avatar_url: None,
        creator_id: creator.id.clone(),
        members: group_members,
        last_message_id: None,
        settings: GroupSettings {
            only_admins_can_post,
        },
        is_active: true,
        created_at: now,
    };
    state
        .store
        .insert_group(group.clone())
        .await
        .expect("seed group");
    group
}

/// Mint a valid access token for a user.
pub fn mint_token(user_id: &str) -> String {
    mint_token_with_ttl(user_id, 3600)
}

/// Mint a token with a chosen TTL. Distinct TTLs give a user distinct
/// tokens (JWT encoding is deterministic over identical claims).
pub fn mint_token_with_ttl(user_id: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

/// Mint an already-expired token.
pub fn mint_expired_token(user_id: &str) -> String {
    let past = Utc::now().timestamp() - 600;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: past,
        exp: past + 1,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("mint expired token")
}
