//! Typed client for the storefront REST API.
//!
//! One method per endpoint and no retry policy: a 401 is reported, not
//! handled, so the refresh-and-retry decision lives in exactly one place
//! (the session manager's authorized-call helper).
//!
//! Response handling always reads the status and the full body text
//! before parsing anything. A failure status maps to
//! [`ApiError::Unauthorized`] or [`ApiError::Rejected`] carrying the
//! server's own message when the body has one, and a success body that
//! fails to parse maps to [`ApiError::Malformed`].

mod error;
mod types;

pub use error::ApiError;
pub use types::{AuthPayload, CartLineWire, RawTokens, RefreshPayload, WishlistEntryWire};

use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use tamarind_core::{Jwt, ProductId, ProductSummary, User, VariantId, WishlistEntryId};

use crate::config::ClientConfig;
use types::{
    AddCartLineBody, AddWishlistEntryBody, CartEnvelope, GoogleSignInBody, LoginBody,
    RefreshBody, RegisterBody, UpdateCartLineBody, UserEnvelope, WishlistEnvelope,
};

const USER_AGENT: &str = concat!("Tamarind/", env!("CARGO_PKG_VERSION"));

/// Client for the storefront REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.trim_end_matches('/').to_owned(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.base_url)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up the account behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is not accepted.
    pub async fn fetch_current_user(&self, access: &Jwt) -> Result<User, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url("auth/me"))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        let envelope: UserEnvelope = read_json(response).await?;
        Ok(envelope.user)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for wrong credentials and
    /// `ApiError::Rejected` for other server-side refusals.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("auth/login"))
            .json(&LoginBody { email, password })
            .send()
            .await?;

        read_json(response).await
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the registration
    /// (for example, an address that is already taken).
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthPayload, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("auth/register"))
            .json(&RegisterBody {
                name,
                email,
                password,
            })
            .send()
            .await?;

        read_json(response).await
    }

    /// Exchange a Google ID token for a storefront session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the ID token is not accepted.
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthPayload, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("auth/google"))
            .json(&GoogleSignInBody { id_token })
            .send()
            .await?;

        read_json(response).await
    }

    /// Exchange a refresh token for a fresh token pair.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the refresh token has been
    /// revoked or expired.
    pub async fn refresh(&self, refresh: &Jwt) -> Result<RefreshPayload, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("auth/refresh"))
            .json(&RefreshBody {
                refresh_token: refresh.as_str(),
            })
            .send()
            .await?;

        read_json(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the summary of one product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with status 404 for unknown products.
    pub async fn fetch_product(&self, id: &ProductId) -> Result<ProductSummary, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("products/{id}")))
            .send()
            .await?;

        read_json(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cart
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the canonical cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is not accepted.
    pub async fn fetch_cart(&self, access: &Jwt) -> Result<Vec<CartLineWire>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url("cart"))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        let envelope: CartEnvelope = read_json(response).await?;
        Ok(envelope.items)
    }

    /// Add quantity of a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the line.
    pub async fn add_cart_line(
        &self,
        access: &Jwt,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("cart/items"))
            .bearer_auth(access.as_str())
            .json(&AddCartLineBody {
                product_id: product_id.as_str(),
                variant_id: variant_id.map(VariantId::as_str),
                quantity,
            })
            .send()
            .await?;

        read_ok(response).await
    }

    /// Set the quantity of an existing cart line.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the update.
    pub async fn update_cart_line(
        &self,
        access: &Jwt,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .put(self.url(&format!("cart/items/{product_id}")))
            .bearer_auth(access.as_str())
            .json(&UpdateCartLineBody { quantity })
            .send()
            .await?;

        read_ok(response).await
    }

    /// Remove a product's line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the removal.
    pub async fn remove_cart_line(
        &self,
        access: &Jwt,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .delete(self.url(&format!("cart/items/{product_id}")))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        read_ok(response).await
    }

    /// Empty the cart server-side.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses.
    pub async fn clear_cart(&self, access: &Jwt) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .delete(self.url("cart"))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        read_ok(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wishlist
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the canonical wishlist with server-assigned entry IDs.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is not accepted.
    pub async fn fetch_wishlist(&self, access: &Jwt) -> Result<Vec<WishlistEntryWire>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url("wishlist"))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        let envelope: WishlistEnvelope = read_json(response).await?;
        Ok(envelope.items)
    }

    /// Add a product to the wishlist.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the entry.
    pub async fn add_wishlist_entry(
        &self,
        access: &Jwt,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("wishlist/items"))
            .bearer_auth(access.as_str())
            .json(&AddWishlistEntryBody {
                product_id: product_id.as_str(),
            })
            .send()
            .await?;

        read_ok(response).await
    }

    /// Remove a wishlist entry by its server-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses the removal.
    pub async fn remove_wishlist_entry(
        &self,
        access: &Jwt,
        entry_id: &WishlistEntryId,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .delete(self.url(&format!("wishlist/items/{entry_id}")))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        read_ok(response).await
    }

    /// Empty the wishlist server-side.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` if the server refuses.
    pub async fn clear_wishlist(&self, access: &Jwt) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .delete(self.url("wishlist"))
            .bearer_auth(access.as_str())
            .send()
            .await?;

        read_ok(response).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response handling
// ─────────────────────────────────────────────────────────────────────────────

/// Read a response as JSON, mapping failure statuses onto the error
/// taxonomy before any parsing happens.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(error_for(status, &text));
    }

    Ok(serde_json::from_str(&text)?)
}

/// Read a response where only the status matters.
async fn read_ok(response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let text = response.text().await.unwrap_or_default();
    Err(error_for(status, &text))
}

fn error_for(status: StatusCode, body: &str) -> ApiError {
    let message = extract_message(body)
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ApiError::Unauthorized(message)
    } else {
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

/// Pull the server's human-readable message out of an error body, when
/// the body is JSON carrying one under `message` or `error`.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
}
