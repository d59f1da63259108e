//! End-to-end session lifecycle against a stub storefront.
//!
//! Exercises boot resolution, credential flows, token persistence
//! across manager instances, and the behaviors that keep a flaky
//! network from destroying a valid session.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tamarind_client::{
    ApiClient, ClientConfig, FileTokenStore, MemoryTokenStore, SessionManager, SessionStatus,
    TokenStore, session::keys,
};
use tamarind_core::UserUpdate;
use tamarind_integration_tests::{StubShop, client_for, client_with_store, endpoints};

const EMAIL: &str = "jane@example.com";
const PASSWORD: &str = "correct horse";

// =============================================================================
// Boot resolution
// =============================================================================

#[tokio::test]
async fn test_fresh_store_boots_anonymous_without_network() {
    let shop = StubShop::start().await;
    let client = client_for(&shop);

    let status = client.session.initialize().await.unwrap();

    assert_eq!(status, SessionStatus::Anonymous);
    assert_eq!(shop.calls(endpoints::AUTH_ME), 0);
}

#[tokio::test]
async fn test_initialize_restores_account_from_stored_tokens() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    let first = client_with_store(&shop, Arc::clone(&store));
    first.session.login(EMAIL, PASSWORD).await.unwrap();

    // A second manager over the same store stands in for the next
    // process launch.
    let second = client_with_store(&shop, store);
    let status = second.session.initialize().await.unwrap();

    assert_eq!(status, SessionStatus::Authenticated);
    let user = second.session.current_user().unwrap();
    assert_eq!(user.email.as_str(), EMAIL);
    assert_eq!(shop.calls(endpoints::AUTH_LOGIN), 1);
}

#[tokio::test]
async fn test_initialize_refreshes_expired_access_token_once() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    let first = client_with_store(&shop, Arc::clone(&store));
    first.session.login(EMAIL, PASSWORD).await.unwrap();

    shop.revoke_access_tokens();

    let second = client_with_store(&shop, store);
    let status = second.session.initialize().await.unwrap();

    assert_eq!(status, SessionStatus::Authenticated);
    // Identity was asked for twice (before and after the refresh), and
    // the refresh itself ran exactly once.
    assert_eq!(shop.calls(endpoints::AUTH_ME), 2);
    assert_eq!(shop.calls(endpoints::AUTH_REFRESH), 1);
}

#[tokio::test]
async fn test_initialize_with_revoked_session_falls_back_to_anonymous() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    let first = client_with_store(&shop, Arc::clone(&store));
    first.session.login(EMAIL, PASSWORD).await.unwrap();

    shop.revoke_all_tokens();

    let second = client_with_store(&shop, Arc::clone(&store));
    let status = second.session.initialize().await.unwrap();

    assert_eq!(status, SessionStatus::Anonymous);
    // The unusable tokens were discarded.
    assert!(store.access_token().is_none());
    assert!(store.refresh_token().is_none());
}

// =============================================================================
// Persistence on disk
// =============================================================================

#[tokio::test]
async fn test_login_persists_tokens_for_the_next_process() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");

    let first = client_with_store(&shop, Arc::new(FileTokenStore::open(&path)));
    first.session.login(EMAIL, PASSWORD).await.unwrap();

    // The file carries the refresh token under both the current key and
    // the legacy one older releases read.
    let raw = std::fs::read_to_string(&path).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(stored.get(keys::ACCESS_TOKEN).is_some());
    assert_eq!(
        stored.get(keys::REFRESH_TOKEN),
        stored.get(keys::REFRESH_TOKEN_LEGACY)
    );

    let second = client_with_store(&shop, Arc::new(FileTokenStore::open(&path)));
    let status = second.session.initialize().await.unwrap();
    assert_eq!(status, SessionStatus::Authenticated);
}

// =============================================================================
// Credential flows
// =============================================================================

#[tokio::test]
async fn test_login_failure_surfaces_the_server_message() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let client = client_for(&shop);
    let err = client.session.login(EMAIL, "wrong").await.unwrap_err();

    assert_eq!(err.to_string(), "invalid credentials");
    assert!(!client.session.is_authenticated());
}

#[tokio::test]
async fn test_register_duplicate_email_is_rejected() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let client = client_for(&shop);
    let err = client
        .session
        .register("Jane Again", EMAIL, PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "email already registered");
}

#[tokio::test]
async fn test_register_establishes_a_session() {
    let shop = StubShop::start().await;

    let client = client_for(&shop);
    let user = client
        .session
        .register("Sam", "sam@example.com", "hunter2")
        .await
        .unwrap();

    assert_eq!(user.email.as_str(), "sam@example.com");
    assert_eq!(client.session.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_google_sign_in_establishes_a_session() {
    let shop = StubShop::start().await;

    let client = client_for(&shop);
    let user = client.session.login_with_google("id-token").await.unwrap();

    assert_eq!(user.email.as_str(), "google-user@example.com");
    assert!(client.session.is_authenticated());
}

#[tokio::test]
async fn test_logout_clears_session_and_store() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    let client = client_with_store(&shop, Arc::clone(&store));
    client.session.login(EMAIL, PASSWORD).await.unwrap();

    client.session.logout();

    assert_eq!(client.session.status(), SessionStatus::Anonymous);
    assert!(client.session.current_user().is_none());
    assert!(store.access_token().is_none());

    // The next boot over the same store resolves anonymous with no
    // identity call.
    let me_before = shop.calls(endpoints::AUTH_ME);
    let next = client_with_store(&shop, store);
    assert_eq!(
        next.session.initialize().await.unwrap(),
        SessionStatus::Anonymous
    );
    assert_eq!(shop.calls(endpoints::AUTH_ME), me_before);
}

#[tokio::test]
async fn test_update_user_merges_into_current_account() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let client = client_for(&shop);
    client.session.login(EMAIL, PASSWORD).await.unwrap();

    client.session.update_user(UserUpdate {
        name: Some("Jane Q.".to_owned()),
        ..UserUpdate::default()
    });

    let user = client.session.current_user().unwrap();
    assert_eq!(user.name.as_deref(), Some("Jane Q."));
    assert_eq!(user.email.as_str(), EMAIL);
}

// =============================================================================
// Network tolerance
// =============================================================================

#[tokio::test]
async fn test_unreachable_server_leaves_stored_tokens_usable() {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");

    let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    let online = client_with_store(&shop, Arc::clone(&store));
    online.session.login(EMAIL, PASSWORD).await.unwrap();

    // A bound-then-dropped listener yields an address that refuses
    // connections.
    let dead_addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = ClientConfig::new(format!("http://{dead_addr}"), "/tmp/unused-tokens.json");
    let api = ApiClient::new(&config).unwrap();
    let offline = SessionManager::new(api, Arc::clone(&store));

    let err = offline.initialize().await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(offline.status(), SessionStatus::Initializing);
    assert!(store.access_token().is_some());

    // The same store resolves normally once the server is reachable.
    let recovered = client_with_store(&shop, store);
    assert_eq!(
        recovered.session.initialize().await.unwrap(),
        SessionStatus::Authenticated
    );
}
