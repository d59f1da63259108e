//! Integration test support for Tamarind.
//!
//! [`StubShop`] is an in-process storefront API that is good enough to
//! drive the real client through full session and collection flows: it
//! issues structurally valid tokens with single-use refresh tokens,
//! keeps per-account carts and wishlists, counts calls per endpoint,
//! and can be told to fail the next call to an endpoint with a chosen
//! status and message.
//!
//! ```rust,ignore
//! let shop = StubShop::start().await;
//! shop.seed_account("jane@example.com", "secret", "Jane");
//! shop.seed_product("prod_1", "Linen Shirt", "24.99");
//!
//! let client = client_for(&shop);
//! client.session.login("jane@example.com", "secret").await?;
//! client.cart.add(&ProductId::new("prod_1"), 2, None).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use tamarind_client::{
    ApiClient, CartStore, ClientConfig, MemoryTokenStore, SessionManager, TokenStore,
    WishlistStore,
};

/// Endpoint names used for call counting and failure injection.
pub mod endpoints {
    pub const AUTH_LOGIN: &str = "auth_login";
    pub const AUTH_REGISTER: &str = "auth_register";
    pub const AUTH_GOOGLE: &str = "auth_google";
    pub const AUTH_REFRESH: &str = "auth_refresh";
    pub const AUTH_ME: &str = "auth_me";
    pub const PRODUCTS_GET: &str = "products_get";
    pub const CART_GET: &str = "cart_get";
    pub const CART_ADD: &str = "cart_add";
    pub const CART_UPDATE: &str = "cart_update";
    pub const CART_REMOVE: &str = "cart_remove";
    pub const CART_CLEAR: &str = "cart_clear";
    pub const WISHLIST_GET: &str = "wishlist_get";
    pub const WISHLIST_ADD: &str = "wishlist_add";
    pub const WISHLIST_REMOVE: &str = "wishlist_remove";
    pub const WISHLIST_CLEAR: &str = "wishlist_clear";
}

// =============================================================================
// Stub server
// =============================================================================

/// An in-process storefront API listening on a random local port.
pub struct StubShop {
    base_url: String,
    state: Arc<ShopState>,
    server: JoinHandle<()>,
}

impl StubShop {
    /// Start a fresh shop with no accounts and no products.
    pub async fn start() -> Self {
        let state = Arc::new(ShopState::new());
        let app = router(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn seed_account(&self, email: &str, password: &str, name: &str) {
        let n = self.state.ids.fetch_add(1, Ordering::Relaxed);
        self.state.accounts.lock().unwrap().insert(
            email.to_owned(),
            Account {
                id: format!("usr_{n}"),
                email: email.to_owned(),
                password: password.to_owned(),
                name: name.to_owned(),
            },
        );
    }

    pub fn seed_product(&self, id: &str, title: &str, amount: &str) {
        self.state.products.lock().unwrap().insert(
            id.to_owned(),
            Product {
                id: id.to_owned(),
                title: title.to_owned(),
                amount: amount.to_owned(),
            },
        );
    }

    /// How many times an endpoint has been called, injected failures
    /// included.
    #[must_use]
    pub fn calls(&self, endpoint: &str) -> u32 {
        self.state
            .calls
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Arm a one-shot failure for the next call to `endpoint`.
    pub fn fail_next(&self, endpoint: &'static str, status: u16, message: &str) {
        self.state
            .failures
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back((status, message.to_owned()));
    }

    /// Invalidate every issued access token, keeping refresh tokens
    /// usable.
    pub fn revoke_access_tokens(&self) {
        self.state.access_tokens.lock().unwrap().clear();
    }

    /// Invalidate everything issued.
    pub fn revoke_all_tokens(&self) {
        self.state.access_tokens.lock().unwrap().clear();
        self.state.refresh_tokens.lock().unwrap().clear();
    }

    /// Server-side cart for an account, as (product id, quantity)
    /// pairs.
    #[must_use]
    pub fn cart_of(&self, email: &str) -> Vec<(String, u32)> {
        self.state
            .carts
            .lock()
            .unwrap()
            .get(email)
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| (line.product_id.clone(), line.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Server-side wishlist for an account, as product ids.
    #[must_use]
    pub fn wishlist_of(&self, email: &str) -> Vec<String> {
        self.state
            .wishlists
            .lock()
            .unwrap()
            .get(email)
            .map(|entries| entries.iter().map(|e| e.product_id.clone()).collect())
            .unwrap_or_default()
    }
}

impl Drop for StubShop {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Client wiring
// =============================================================================

/// The full client stack wired against a stub shop.
pub struct TestClient {
    pub session: SessionManager,
    pub cart: CartStore,
    pub wishlist: WishlistStore,
}

/// Build a client stack with a fresh in-memory token store.
#[must_use]
pub fn client_for(shop: &StubShop) -> TestClient {
    client_with_store(shop, Arc::new(MemoryTokenStore::new()))
}

/// Build a client stack over a caller-provided token store.
#[must_use]
pub fn client_with_store(shop: &StubShop, store: Arc<dyn TokenStore>) -> TestClient {
    let config = ClientConfig::new(shop.base_url(), "/tmp/unused-tokens.json");
    let api = ApiClient::new(&config).expect("HTTP client");
    let session = SessionManager::new(api.clone(), store);

    TestClient {
        cart: CartStore::new(api.clone(), session.clone()),
        wishlist: WishlistStore::new(api, session.clone()),
        session,
    }
}

// =============================================================================
// Server state
// =============================================================================

#[derive(Clone)]
struct Account {
    id: String,
    email: String,
    password: String,
    name: String,
}

impl Account {
    fn public(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "name": self.name,
            "role": "customer",
        })
    }
}

#[derive(Clone)]
struct Product {
    id: String,
    title: String,
    amount: String,
}

impl Product {
    fn json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "price": { "amount": self.amount, "currencyCode": "USD" },
        })
    }
}

#[derive(Clone)]
struct CartLine {
    product_id: String,
    variant_id: Option<String>,
    quantity: u32,
}

#[derive(Clone)]
struct WishlistEntry {
    id: String,
    product_id: String,
}

struct ShopState {
    accounts: Mutex<HashMap<String, Account>>,
    access_tokens: Mutex<HashMap<String, String>>,
    refresh_tokens: Mutex<HashMap<String, String>>,
    products: Mutex<HashMap<String, Product>>,
    carts: Mutex<HashMap<String, Vec<CartLine>>>,
    wishlists: Mutex<HashMap<String, Vec<WishlistEntry>>>,
    calls: Mutex<HashMap<&'static str, u32>>,
    failures: Mutex<HashMap<&'static str, VecDeque<(u16, String)>>>,
    ids: AtomicU64,
}

impl ShopState {
    fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            access_tokens: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            products: Mutex::new(HashMap::new()),
            carts: Mutex::new(HashMap::new()),
            wishlists: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            ids: AtomicU64::new(1),
        }
    }

    /// Count the call; return the armed failure response, if any.
    fn record(&self, endpoint: &'static str) -> Option<Response> {
        *self.calls.lock().unwrap().entry(endpoint).or_insert(0) += 1;

        let (status, message) = self
            .failures
            .lock()
            .unwrap()
            .get_mut(endpoint)?
            .pop_front()?;
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Some((status, Json(json!({ "message": message }))).into_response())
    }

    fn authed(&self, headers: &HeaderMap) -> Result<Account, Response> {
        let email = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.access_tokens.lock().unwrap().get(token).cloned());

        email
            .and_then(|email| self.accounts.lock().unwrap().get(&email).cloned())
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "message": "token expired" })),
                )
                    .into_response()
            })
    }

    fn issue(&self, email: &str) -> (String, String) {
        let n = self.ids.fetch_add(1, Ordering::Relaxed);
        let access = mint_token(&json!({ "sub": email, "use": "access", "n": n }).to_string());
        let refresh = mint_token(&json!({ "sub": email, "use": "refresh", "n": n }).to_string());

        self.access_tokens
            .lock()
            .unwrap()
            .insert(access.clone(), email.to_owned());
        self.refresh_tokens
            .lock()
            .unwrap()
            .insert(refresh.clone(), email.to_owned());
        (access, refresh)
    }

    fn auth_payload(&self, account: &Account) -> Value {
        let (access, refresh) = self.issue(&account.email);
        json!({
            "user": account.public(),
            "tokens": { "accessToken": access, "refreshToken": refresh },
        })
    }

    fn cart_json(&self, email: &str) -> Vec<Value> {
        let products = self.products.lock().unwrap();
        self.carts
            .lock()
            .unwrap()
            .get(email)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| {
                        let product = products.get(&line.product_id)?;
                        Some(json!({
                            "product": product.json(),
                            "variantId": line.variant_id,
                            "quantity": line.quantity,
                        }))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn wishlist_json(&self, email: &str) -> Vec<Value> {
        let products = self.products.lock().unwrap();
        self.wishlists
            .lock()
            .unwrap()
            .get(email)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let product = products.get(&entry.product_id)?;
                        Some(json!({ "id": entry.id, "product": product.json() }))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Three unpadded base64url segments, enough to pass structural checks.
fn mint_token(claims: &str) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims),
        URL_SAFE_NO_PAD.encode(b"stub-signature"),
    )
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Arc<ShopState>) -> Router {
    Router::new()
        .route("/auth/login", post(auth_login))
        .route("/auth/register", post(auth_register))
        .route("/auth/google", post(auth_google))
        .route("/auth/refresh", post(auth_refresh))
        .route("/auth/me", get(auth_me))
        .route("/products/{id}", get(products_get))
        .route("/cart", get(cart_get).delete(cart_clear))
        .route("/cart/items", post(cart_add))
        .route("/cart/items/{id}", put(cart_update).delete(cart_remove))
        .route("/wishlist", get(wishlist_get).delete(wishlist_clear))
        .route("/wishlist/items", post(wishlist_add))
        .route("/wishlist/items/{id}", delete(wishlist_remove))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    id_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCartRequest {
    product_id: String,
    #[serde(default)]
    variant_id: Option<String>,
    quantity: u32,
}

#[derive(Deserialize)]
struct UpdateCartRequest {
    quantity: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddWishlistRequest {
    product_id: String,
}

async fn auth_login(
    State(state): State<Arc<ShopState>>,
    Json(body): Json<LoginRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::AUTH_LOGIN) {
        return failure;
    }

    let account = state.accounts.lock().unwrap().get(&body.email).cloned();
    match account {
        Some(account) if account.password == body.password => {
            Json(state.auth_payload(&account)).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid credentials" })),
        )
            .into_response(),
    }
}

async fn auth_register(
    State(state): State<Arc<ShopState>>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::AUTH_REGISTER) {
        return failure;
    }

    let mut accounts = state.accounts.lock().unwrap();
    if accounts.contains_key(&body.email) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "email already registered" })),
        )
            .into_response();
    }

    let n = state.ids.fetch_add(1, Ordering::Relaxed);
    let account = Account {
        id: format!("usr_{n}"),
        email: body.email.clone(),
        password: body.password,
        name: body.name,
    };
    accounts.insert(body.email, account.clone());
    drop(accounts);

    Json(state.auth_payload(&account)).into_response()
}

async fn auth_google(
    State(state): State<Arc<ShopState>>,
    Json(body): Json<GoogleRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::AUTH_GOOGLE) {
        return failure;
    }

    if body.id_token.is_empty() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "invalid id token" })),
        )
            .into_response();
    }

    // One fixed federated account is enough for the flows under test.
    let email = "google-user@example.com";
    let account = state
        .accounts
        .lock()
        .unwrap()
        .entry(email.to_owned())
        .or_insert_with(|| Account {
            id: "usr_google".to_owned(),
            email: email.to_owned(),
            password: String::new(),
            name: "Google User".to_owned(),
        })
        .clone();

    Json(state.auth_payload(&account)).into_response()
}

async fn auth_refresh(
    State(state): State<Arc<ShopState>>,
    Json(body): Json<RefreshRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::AUTH_REFRESH) {
        return failure;
    }

    // Refresh tokens are single-use; a second exchange with the same
    // token fails like a revoked session would.
    let email = state
        .refresh_tokens
        .lock()
        .unwrap()
        .remove(&body.refresh_token);
    let Some(email) = email else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "refresh token revoked" })),
        )
            .into_response();
    };

    let (access, refresh) = state.issue(&email);
    Json(json!({ "tokens": { "accessToken": access, "refreshToken": refresh } })).into_response()
}

async fn auth_me(State(state): State<Arc<ShopState>>, headers: HeaderMap) -> Response {
    if let Some(failure) = state.record(endpoints::AUTH_ME) {
        return failure;
    }

    match state.authed(&headers) {
        Ok(account) => Json(json!({ "user": account.public() })).into_response(),
        Err(response) => response,
    }
}

async fn products_get(State(state): State<Arc<ShopState>>, Path(id): Path<String>) -> Response {
    if let Some(failure) = state.record(endpoints::PRODUCTS_GET) {
        return failure;
    }

    let product = state.products.lock().unwrap().get(&id).cloned();
    match product {
        Some(product) => Json(product.json()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "no such product" })),
        )
            .into_response(),
    }
}

async fn cart_get(State(state): State<Arc<ShopState>>, headers: HeaderMap) -> Response {
    if let Some(failure) = state.record(endpoints::CART_GET) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };
    Json(json!({ "items": state.cart_json(&account.email) })).into_response()
}

async fn cart_add(
    State(state): State<Arc<ShopState>>,
    headers: HeaderMap,
    Json(body): Json<AddCartRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::CART_ADD) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };
    if !state.products.lock().unwrap().contains_key(&body.product_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "no such product" })),
        )
            .into_response();
    }

    let mut carts = state.carts.lock().unwrap();
    let lines = carts.entry(account.email).or_default();
    match lines
        .iter_mut()
        .find(|line| line.product_id == body.product_id)
    {
        Some(line) => line.quantity += body.quantity,
        None => lines.push(CartLine {
            product_id: body.product_id,
            variant_id: body.variant_id,
            quantity: body.quantity,
        }),
    }
    StatusCode::OK.into_response()
}

async fn cart_update(
    State(state): State<Arc<ShopState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(body): Json<UpdateCartRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::CART_UPDATE) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };

    let mut carts = state.carts.lock().unwrap();
    let line = carts
        .entry(account.email)
        .or_default()
        .iter_mut()
        .find(|line| line.product_id == product_id);
    match line {
        Some(line) => {
            line.quantity = body.quantity;
            StatusCode::OK.into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "that item is not in the cart" })),
        )
            .into_response(),
    }
}

async fn cart_remove(
    State(state): State<Arc<ShopState>>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Response {
    if let Some(failure) = state.record(endpoints::CART_REMOVE) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };

    state
        .carts
        .lock()
        .unwrap()
        .entry(account.email)
        .or_default()
        .retain(|line| line.product_id != product_id);
    StatusCode::OK.into_response()
}

async fn cart_clear(State(state): State<Arc<ShopState>>, headers: HeaderMap) -> Response {
    if let Some(failure) = state.record(endpoints::CART_CLEAR) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };

    state.carts.lock().unwrap().insert(account.email, Vec::new());
    StatusCode::OK.into_response()
}

async fn wishlist_get(State(state): State<Arc<ShopState>>, headers: HeaderMap) -> Response {
    if let Some(failure) = state.record(endpoints::WISHLIST_GET) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };
    Json(json!({ "items": state.wishlist_json(&account.email) })).into_response()
}

async fn wishlist_add(
    State(state): State<Arc<ShopState>>,
    headers: HeaderMap,
    Json(body): Json<AddWishlistRequest>,
) -> Response {
    if let Some(failure) = state.record(endpoints::WISHLIST_ADD) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };
    if !state.products.lock().unwrap().contains_key(&body.product_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "no such product" })),
        )
            .into_response();
    }

    let mut wishlists = state.wishlists.lock().unwrap();
    let entries = wishlists.entry(account.email).or_default();
    if !entries
        .iter()
        .any(|entry| entry.product_id == body.product_id)
    {
        let n = state.ids.fetch_add(1, Ordering::Relaxed);
        entries.push(WishlistEntry {
            id: format!("wl_{n}"),
            product_id: body.product_id,
        });
    }
    StatusCode::OK.into_response()
}

async fn wishlist_remove(
    State(state): State<Arc<ShopState>>,
    headers: HeaderMap,
    Path(entry_id): Path<String>,
) -> Response {
    if let Some(failure) = state.record(endpoints::WISHLIST_REMOVE) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };

    let mut wishlists = state.wishlists.lock().unwrap();
    let entries = wishlists.entry(account.email).or_default();
    let before = entries.len();
    entries.retain(|entry| entry.id != entry_id);
    if entries.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "no such entry" })),
        )
            .into_response();
    }
    StatusCode::OK.into_response()
}

async fn wishlist_clear(State(state): State<Arc<ShopState>>, headers: HeaderMap) -> Response {
    if let Some(failure) = state.record(endpoints::WISHLIST_CLEAR) {
        return failure;
    }

    let account = match state.authed(&headers) {
        Ok(account) => account,
        Err(response) => return response,
    };

    state
        .wishlists
        .lock()
        .unwrap()
        .insert(account.email, Vec::new());
    StatusCode::OK.into_response()
}
