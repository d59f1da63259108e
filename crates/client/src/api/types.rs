//! Wire payloads for the storefront REST API.

use serde::{Deserialize, Serialize};

use tamarind_core::{ProductSummary, User, VariantId, WishlistEntryId};

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Token pair as the auth endpoints encode it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response body of login, register, and the OAuth sign-in exchange.
#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    pub user: User,
    pub tokens: RawTokens,
}

/// Response body of the token refresh endpoint.
#[derive(Debug, Deserialize)]
pub struct RefreshPayload {
    pub tokens: RawTokens,
}

/// Response body of the identity lookup.
#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// One cart line as the server returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineWire {
    pub product: ProductSummary,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

/// Cart collection envelope.
#[derive(Debug, Deserialize)]
pub struct CartEnvelope {
    pub items: Vec<CartLineWire>,
}

/// One wishlist entry as the server returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct WishlistEntryWire {
    pub id: WishlistEntryId,
    pub product: ProductSummary,
}

/// Wishlist collection envelope.
#[derive(Debug, Deserialize)]
pub struct WishlistEnvelope {
    pub items: Vec<WishlistEntryWire>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterBody<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInBody<'a> {
    pub id_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartLineBody<'a> {
    pub product_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<&'a str>,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct UpdateCartLineBody {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistEntryBody<'a> {
    pub product_id: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_payload_deserializes() {
        let payload: AuthPayload = serde_json::from_str(
            r#"{
                "user": {"id": "usr_1", "email": "shopper@example.com"},
                "tokens": {"accessToken": "a.b.c", "refreshToken": "d.e.f"}
            }"#,
        )
        .unwrap();
        assert_eq!(payload.tokens.access_token, "a.b.c");
        assert_eq!(payload.user.email.as_str(), "shopper@example.com");
    }

    #[test]
    fn test_cart_line_variant_optional() {
        let line: CartLineWire = serde_json::from_str(
            r#"{
                "product": {"id": "prd_1", "title": "Boot", "price": {"amount": "89.00", "currencyCode": "USD"}},
                "quantity": 2
            }"#,
        )
        .unwrap();
        assert!(line.variant_id.is_none());
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_add_cart_line_body_omits_missing_variant() {
        let body = AddCartLineBody {
            product_id: "prd_1",
            variant_id: None,
            quantity: 1,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"productId":"prd_1","quantity":1}"#);
    }
}
