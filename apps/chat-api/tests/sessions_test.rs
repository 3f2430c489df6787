mod common;

use axum_test::TestServer;

use chat_api::db::store::ChatStore;
use serde_json::Value;

// ---------------------------------------------------------------------------
// GET /api/v1/sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listing_requires_authentication() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/api/v1/sessions").await;
    resp.assert_status_unauthorized();
}

#[tokio::test]
async fn listing_rejects_expired_tokens() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user = common::seed_user(&state, "alice").await;
    let token = common::mint_expired_token(&user.id);

    let resp = server
        .get("/api/v1/sessions")
        .authorization_bearer(token)
        .await;
    resp.assert_status_unauthorized();
}

#[tokio::test]
async fn listing_marks_the_current_session() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user = common::seed_user(&state, "alice").await;
    let current = common::mint_token_with_ttl(&user.id, 3600);
    let other = common::mint_token_with_ttl(&user.id, 7200);
    state
        .store
        .find_or_create_session(&user.id, &other)
        .await
        .unwrap();

    let resp = server
        .get("/api/v1/sessions")
        .authorization_bearer(&current)
        .await;
    resp.assert_status_ok();

    let body: Value = resp.json();
    let sessions = body["sessions"].as_array().unwrap();
    // The extractor created a session for `current` on this request.
    assert_eq!(sessions.len(), 2);
    let current_flags: Vec<bool> = sessions
        .iter()
        .map(|s| s["current"].as_bool().unwrap())
        .collect();
    assert_eq!(current_flags.iter().filter(|c| **c).count(), 1);
    // Tokens are never echoed back.
    assert!(sessions.iter().all(|s| s.get("token").is_none()));
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/sessions/{session_id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn revoking_an_unknown_session_is_not_found() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user = common::seed_user(&state, "alice").await;
    let token = common::mint_token(&user.id);

    let resp = server
        .delete("/api/v1/sessions/ses_missing")
        .authorization_bearer(token)
        .await;
    resp.assert_status_not_found();
}

#[tokio::test]
async fn revoking_another_users_session_is_not_found() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let alice = common::seed_user(&state, "alice").await;
    let bob = common::seed_user(&state, "bob").await;

    let bob_token = common::mint_token(&bob.id);
    let bob_session = state
        .store
        .find_or_create_session(&bob.id, &bob_token)
        .await
        .unwrap();

    let resp = server
        .delete(&format!("/api/v1/sessions/{}", bob_session.id))
        .authorization_bearer(common::mint_token(&alice.id))
        .await;
    resp.assert_status_not_found();

    // Bob's session is untouched.
    let stored = state
        .store
        .find_session(&bob_session.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_active);
}

#[tokio::test]
async fn revoking_a_session_deactivates_it() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user = common::seed_user(&state, "alice").await;
    let current = common::mint_token_with_ttl(&user.id, 3600);
    let other = common::mint_token_with_ttl(&user.id, 7200);
    let other_session = state
        .store
        .find_or_create_session(&user.id, &other)
        .await
        .unwrap();

    let resp = server
        .delete(&format!("/api/v1/sessions/{}", other_session.id))
        .authorization_bearer(&current)
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["message"], "Session revoked successfully");

    let stored = state
        .store
        .find_session(&other_session.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);

    // Revoking again fails: it is already inactive.
    let resp = server
        .delete(&format!("/api/v1/sessions/{}", other_session.id))
        .authorization_bearer(&current)
        .await;
    resp.assert_status_not_found();
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn revoking_all_other_sessions_spares_the_current_one() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let user = common::seed_user(&state, "alice").await;
    let current = common::mint_token_with_ttl(&user.id, 3600);
    let other_a = common::mint_token_with_ttl(&user.id, 7200);
    let other_b = common::mint_token_with_ttl(&user.id, 10800);

    let current_session = state
        .store
        .find_or_create_session(&user.id, &current)
        .await
        .unwrap();
    state
        .store
        .find_or_create_session(&user.id, &other_a)
        .await
        .unwrap();
    state
        .store
        .find_or_create_session(&user.id, &other_b)
        .await
        .unwrap();

    let resp = server
        .delete("/api/v1/sessions")
        .authorization_bearer(&current)
        .await;
    resp.assert_status_ok();

    let sessions = state.store.sessions_for_user(&user.id).await.unwrap();
    let active: Vec<_> = sessions.iter().filter(|s| s.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, current_session.id);
}
