use super::*;
use crate::{
    gateway::HttpApiGateway,
    persistence::EphemeralSessionPersistence,
    test_support::{spawn_backend, unreachable_base_url, user_json, MockBackend},
};
use serde_json::json;

fn store_for(
    backend: &MockBackend,
) -> (Arc<SessionStore>, Arc<EphemeralSessionPersistence>) {
    let persistence = Arc::new(EphemeralSessionPersistence::default());
    let store = SessionStore::new(backend.gateway(), persistence.clone());
    (store, persistence)
}

async fn login_reply(backend: &MockBackend, token: &str, email: &str) -> User {
    let user = user_json(email);
    backend
        .reply(
            "POST /auth/login",
            200,
            json!({ "access_token": token, "token_type": "bearer", "user": user.clone() }),
        )
        .await;
    serde_json::from_value(user).expect("user")
}

#[tokio::test]
async fn login_authenticates_with_server_user_and_persists() {
    let backend = spawn_backend().await.expect("backend");
    let expected = login_reply(&backend, "token-1", "ada@example.com").await;
    let (store, persistence) = store_for(&backend);

    let user = store
        .login(" ada@example.com ", "hunter2")
        .await
        .expect("login");

    assert_eq!(user, expected);
    let state = store.snapshot().await;
    assert!(state.is_authenticated);
    assert!(!state.is_loading);
    assert_eq!(state.user, Some(expected.clone()));

    let requests = backend.requests_to("POST /auth/login").await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].body,
        Some(json!({ "email": "ada@example.com", "password": "hunter2" }))
    );
    assert_eq!(
        persistence.load_session().await.expect("session"),
        Some(PersistedSession::authenticated(expected))
    );
    assert_eq!(
        persistence.load_token().await.expect("token").as_deref(),
        Some("token-1")
    );
}

#[tokio::test]
async fn login_installs_bearer_token_for_later_requests() {
    let backend = spawn_backend().await.expect("backend");
    login_reply(&backend, "token-xyz", "ada@example.com").await;
    backend
        .reply("GET /auth/me", 200, user_json("ada@example.com"))
        .await;
    let (store, _) = store_for(&backend);

    store.login("ada@example.com", "pw").await.expect("login");
    store.refresh_user().await.expect("refresh");

    let me = backend.requests_to("GET /auth/me").await;
    assert_eq!(me[0].authorization.as_deref(), Some("Bearer token-xyz"));
}

#[tokio::test]
async fn login_rejects_blank_credentials_without_network() {
    let backend = spawn_backend().await.expect("backend");
    let (store, _) = store_for(&backend);

    let err = store.login("   ", "pw").await.expect_err("blank email");
    assert!(matches!(err, ClientError::Validation(_)));
    let err = store
        .login("ada@example.com", "")
        .await
        .expect_err("blank password");
    assert!(matches!(err, ClientError::Validation(_)));

    assert!(backend.requests().await.is_empty());
    assert_eq!(store.snapshot().await, SessionState::default());
}

#[tokio::test]
async fn failed_login_propagates_and_resets_loading() {
    let backend = spawn_backend().await.expect("backend");
    backend
        .reply(
            "POST /auth/login",
            401,
            json!({ "detail": "Incorrect email or password" }),
        )
        .await;
    let (store, persistence) = store_for(&backend);
    let mut events = store.subscribe();

    let err = store
        .login("ada@example.com", "wrong")
        .await
        .expect_err("rejected");

    assert!(err.is_unauthorized());
    assert_eq!(
        err.user_message("Login failed"),
        "Incorrect email or password"
    );
    let state = store.snapshot().await;
    assert!(!state.is_authenticated);
    assert!(state.user.is_none());
    assert!(!state.is_loading);
    assert!(persistence.load_token().await.expect("token").is_none());

    assert_eq!(events.recv().await.expect("event"), SessionEvent::Loading(true));
    assert_eq!(events.recv().await.expect("event"), SessionEvent::Loading(false));
}

#[tokio::test]
async fn register_authenticates_without_separate_login() {
    let backend = spawn_backend().await.expect("backend");
    let user = user_json("grace@example.com");
    backend.reply("POST /auth/register", 201, user.clone()).await;
    let (store, persistence) = store_for(&backend);

    let registered = store
        .register("grace@example.com", "pw", "Grace Hopper")
        .await
        .expect("register");

    assert_eq!(registered.email, "grace@example.com");
    assert!(store.is_authenticated().await);
    assert!(backend.requests_to("POST /auth/login").await.is_empty());
    let body = backend.requests_to("POST /auth/register").await[0]
        .body
        .clone()
        .expect("body");
    assert_eq!(body["full_name"], "Grace Hopper");
    assert!(body.get("locale").is_none());
    assert!(persistence
        .load_session()
        .await
        .expect("session")
        .is_some_and(|session| session.is_authenticated));
}

#[tokio::test]
async fn register_requires_full_name() {
    let backend = spawn_backend().await.expect("backend");
    let (store, _) = store_for(&backend);

    let err = store
        .register("grace@example.com", "pw", "  ")
        .await
        .expect_err("blank name");

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn failed_register_surfaces_validation_detail() {
    let backend = spawn_backend().await.expect("backend");
    backend
        .reply(
            "POST /auth/register",
            422,
            json!({ "detail": [{ "loc": ["body", "email"], "msg": "value is not a valid email address" }] }),
        )
        .await;
    let (store, _) = store_for(&backend);

    let err = store
        .register("not-an-email", "pw", "Grace")
        .await
        .expect_err("rejected");

    assert_eq!(err.status(), Some(422));
    assert_eq!(
        err.user_message("Registration failed"),
        "value is not a valid email address"
    );
    assert!(!store.is_authenticated().await);
}

#[tokio::test]
async fn logout_clears_everything_even_when_backend_fails() {
    let backend = spawn_backend().await.expect("backend");
    login_reply(&backend, "token-1", "ada@example.com").await;
    backend
        .reply("POST /auth/logout", 500, json!({ "detail": "boom" }))
        .await;
    let (store, persistence) = store_for(&backend);
    store.login("ada@example.com", "pw").await.expect("login");
    let mut events = store.subscribe();

    store.logout().await;

    let state = store.snapshot().await;
    assert!(state.user.is_none());
    assert!(!state.is_authenticated);
    assert!(persistence.load_session().await.expect("session").is_none());
    assert!(persistence.load_token().await.expect("token").is_none());
    assert_eq!(events.recv().await.expect("event"), SessionEvent::SignedOut);
}

#[tokio::test]
async fn logout_without_reachable_backend_still_signs_out() {
    let persistence = Arc::new(EphemeralSessionPersistence::with_token("token-1"));
    let gateway = Arc::new(
        HttpApiGateway::new(&unreachable_base_url().await.expect("url")).expect("gateway"),
    );
    let store = SessionStore::new(gateway.clone(), persistence.clone());
    persistence
        .save_session(&PersistedSession::authenticated(
            serde_json::from_value(user_json("ada@example.com")).expect("user"),
        ))
        .await
        .expect("seed");
    assert!(matches!(store.restore().await, RestoreOutcome::Restored(_)));

    store.logout().await;

    assert!(!store.is_authenticated().await);
    assert!(!gateway.has_access_token().await);
    assert!(persistence.load_token().await.expect("token").is_none());
}

#[tokio::test]
async fn refresh_failure_resets_to_anonymous_and_propagates() {
    let backend = spawn_backend().await.expect("backend");
    login_reply(&backend, "token-1", "ada@example.com").await;
    backend
        .reply("GET /auth/me", 401, json!({ "detail": "Could not validate credentials" }))
        .await;
    let (store, persistence) = store_for(&backend);
    store.login("ada@example.com", "pw").await.expect("login");
    let mut events = store.subscribe();

    let err = store.refresh_user().await.expect_err("expired");

    assert!(err.is_unauthorized());
    let state = store.snapshot().await;
    assert!(state.user.is_none());
    assert!(!state.is_authenticated);
    assert!(persistence.load_session().await.expect("session").is_none());
    assert_eq!(events.recv().await.expect("event"), SessionEvent::Expired);
}

#[tokio::test]
async fn restore_without_anything_stays_anonymous() {
    let backend = spawn_backend().await.expect("backend");
    let (store, _) = store_for(&backend);

    assert_eq!(store.restore().await, RestoreOutcome::Anonymous);
    assert!(!store.is_authenticated().await);
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn restore_uses_persisted_snapshot_without_network() {
    let backend = spawn_backend().await.expect("backend");
    let (store, persistence) = store_for(&backend);
    let user: User = serde_json::from_value(user_json("ada@example.com")).expect("user");
    persistence
        .save_session(&PersistedSession::authenticated(user.clone()))
        .await
        .expect("seed");
    persistence.save_token("token-1").await.expect("seed token");

    assert_eq!(store.restore().await, RestoreOutcome::Restored(user.clone()));
    assert_eq!(store.current_user().await, Some(user));
    assert!(backend.requests().await.is_empty());
}

#[tokio::test]
async fn restore_refreshes_user_from_stored_token() {
    let backend = spawn_backend().await.expect("backend");
    backend
        .reply("GET /auth/me", 200, user_json("ada@example.com"))
        .await;
    let persistence = Arc::new(EphemeralSessionPersistence::with_token("token-1"));
    let store = SessionStore::new(backend.gateway(), persistence.clone());

    let outcome = store.restore().await;

    assert!(matches!(outcome, RestoreOutcome::Refreshed(ref user) if user.email == "ada@example.com"));
    assert!(store.is_authenticated().await);
    let me = backend.requests_to("GET /auth/me").await;
    assert_eq!(me[0].authorization.as_deref(), Some("Bearer token-1"));
    assert!(persistence.load_session().await.expect("session").is_some());
}

#[tokio::test]
async fn restore_with_stale_token_discards_it() {
    let backend = spawn_backend().await.expect("backend");
    backend
        .reply("GET /auth/me", 401, json!({ "detail": "Token expired" }))
        .await;
    let persistence = Arc::new(EphemeralSessionPersistence::with_token("stale"));
    let gateway = backend.gateway();
    let store = SessionStore::new(gateway.clone(), persistence.clone());

    let outcome = store.restore().await;

    assert!(matches!(outcome, RestoreOutcome::CredentialDiscarded { .. }));
    assert!(!store.is_authenticated().await);
    assert!(persistence.load_token().await.expect("token").is_none());
    assert!(!gateway.has_access_token().await);
}

#[tokio::test]
async fn restore_treats_forged_snapshot_as_anonymous() {
    let backend = spawn_backend().await.expect("backend");
    let (store, persistence) = store_for(&backend);
    persistence
        .save_session(&PersistedSession {
            user: None,
            is_authenticated: true,
        })
        .await
        .expect("seed");

    assert_eq!(store.restore().await, RestoreOutcome::Anonymous);
    assert!(!store.is_authenticated().await);
}
