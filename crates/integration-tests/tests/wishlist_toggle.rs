//! Wishlist toggling, debouncing, and rollback against a stub
//! storefront.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tamarind_client::stores::TOGGLE_WINDOW;
use tamarind_core::ProductId;
use tamarind_integration_tests::{StubShop, TestClient, client_for, endpoints};

const EMAIL: &str = "jane@example.com";
const PASSWORD: &str = "correct horse";

async fn signed_in_shop() -> (StubShop, TestClient) {
    let shop = StubShop::start().await;
    shop.seed_account(EMAIL, PASSWORD, "Jane");
    shop.seed_product("prd_boot", "Desert Boot", "89.00");

    let client = client_for(&shop);
    client.session.login(EMAIL, PASSWORD).await.unwrap();
    (shop, client)
}

// =============================================================================
// Toggle
// =============================================================================

#[tokio::test]
async fn test_toggle_adds_and_adopts_the_server_entry() {
    let (shop, client) = signed_in_shop().await;
    let boot = ProductId::new("prd_boot");

    client.wishlist.toggle(&boot).await.unwrap();

    assert!(client.wishlist.contains(&boot));
    // The follow-up fetch replaced the placeholder with the server's
    // entry, product details included.
    let entries = client.wishlist.entries();
    assert_eq!(entries.len(), 1);
    let entry = entries.first().unwrap();
    assert_eq!(entry.product.as_ref().unwrap().title, "Desert Boot");
    assert_eq!(shop.wishlist_of(EMAIL), vec!["prd_boot".to_owned()]);
    assert_eq!(shop.calls(endpoints::WISHLIST_ADD), 1);
}

#[tokio::test]
async fn test_rapid_second_toggle_is_dropped() {
    let (shop, client) = signed_in_shop().await;
    let boot = ProductId::new("prd_boot");

    client.wishlist.toggle(&boot).await.unwrap();
    client.wishlist.toggle(&boot).await.unwrap();

    // The double-tap produced one server mutation, not an add and a
    // remove.
    assert!(client.wishlist.contains(&boot));
    assert_eq!(shop.calls(endpoints::WISHLIST_ADD), 1);
    assert_eq!(shop.calls(endpoints::WISHLIST_REMOVE), 0);
    assert_eq!(shop.wishlist_of(EMAIL), vec!["prd_boot".to_owned()]);
}

#[tokio::test]
async fn test_toggle_after_the_window_removes() {
    let (shop, client) = signed_in_shop().await;
    let boot = ProductId::new("prd_boot");

    client.wishlist.toggle(&boot).await.unwrap();
    tokio::time::sleep(TOGGLE_WINDOW + Duration::from_millis(50)).await;
    client.wishlist.toggle(&boot).await.unwrap();

    assert!(!client.wishlist.contains(&boot));
    assert!(shop.wishlist_of(EMAIL).is_empty());
    assert_eq!(shop.calls(endpoints::WISHLIST_REMOVE), 1);
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn test_rejected_add_rolls_the_entry_back() {
    let (shop, client) = signed_in_shop().await;
    let boot = ProductId::new("prd_boot");

    shop.fail_next(endpoints::WISHLIST_ADD, 422, "wishlist is full");
    let err = client.wishlist.toggle(&boot).await.unwrap_err();

    assert_eq!(err.to_string(), "wishlist is full");
    assert!(!client.wishlist.contains(&boot));
    assert!(client.wishlist.is_empty());
    assert!(shop.wishlist_of(EMAIL).is_empty());
}

#[tokio::test]
async fn test_entry_awaiting_its_server_id_cannot_be_removed() {
    let (shop, client) = signed_in_shop().await;
    let boot = ProductId::new("prd_boot");

    // The add is accepted but the follow-up fetch fails, leaving the
    // local entry without a server ID.
    shop.fail_next(endpoints::WISHLIST_GET, 500, "unavailable");
    client.wishlist.toggle(&boot).await.unwrap_err();
    assert!(client.wishlist.contains(&boot));

    let err = client.wishlist.remove(&boot).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "that item is still syncing, try again in a moment"
    );
    // No removal went out, and the server still has the entry.
    assert_eq!(shop.calls(endpoints::WISHLIST_REMOVE), 0);
    assert_eq!(shop.wishlist_of(EMAIL), vec!["prd_boot".to_owned()]);

    // A later successful fetch adopts the server ID and unblocks the
    // removal.
    client.wishlist.refresh().await.unwrap();
    client.wishlist.remove(&boot).await.unwrap();
    assert!(shop.wishlist_of(EMAIL).is_empty());
}

// =============================================================================
// Clear
// =============================================================================

#[tokio::test]
async fn test_clear_keeps_entries_until_the_server_confirms() {
    let (shop, client) = signed_in_shop().await;
    let boot = ProductId::new("prd_boot");
    client.wishlist.toggle(&boot).await.unwrap();

    shop.fail_next(endpoints::WISHLIST_CLEAR, 500, "maintenance");
    client.wishlist.clear().await.unwrap_err();

    assert!(client.wishlist.contains(&boot));
    assert_eq!(shop.wishlist_of(EMAIL), vec!["prd_boot".to_owned()]);

    client.wishlist.clear().await.unwrap();
    assert!(client.wishlist.is_empty());
    assert!(shop.wishlist_of(EMAIL).is_empty());
}
