//! Bearer token types.
//!
//! The storefront API issues JWT-shaped bearer tokens. The client never
//! verifies signatures or expiry claims; it only checks that a stored
//! string still has the shape of a token before trusting it, and lets the
//! server's 401 responses drive the refresh path.

use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Jwt`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum TokenError {
    /// The input string is empty.
    #[error("token cannot be empty")]
    Empty,
    /// The input does not have the `header.payload.signature` shape.
    #[error("token must have three dot-separated segments")]
    MalformedStructure,
    /// A segment is not valid unpadded base64url.
    #[error("token segment is not base64url encoded")]
    InvalidEncoding,
}

/// A structurally validated JWT bearer token.
///
/// "Structurally valid" means three non-empty dot-separated segments, each
/// decodable as unpadded base64url. Nothing more: claims are opaque here.
///
/// `Debug` redacts the token so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jwt(String);

impl Jwt {
    /// Parse a `Jwt` from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty, does not consist of
    /// exactly three dot-separated segments, or any segment fails to decode
    /// as unpadded base64url.
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(TokenError::Empty);
        }

        let segments: Vec<&str> = s.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|seg| seg.is_empty()) {
            return Err(TokenError::MalformedStructure);
        }

        for segment in segments {
            if URL_SAFE_NO_PAD.decode(segment).is_err() {
                return Err(TokenError::InvalidEncoding);
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the raw token for use in an `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Jwt` and returns the raw token string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Jwt").field(&"[REDACTED]").finish()
    }
}

/// An access/refresh token pair as issued by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Short-lived token attached to authenticated requests.
    pub access: Jwt,
    /// Long-lived token exchanged for a new pair when the access token
    /// stops being accepted.
    pub refresh: Jwt,
}

impl TokenPair {
    /// Create a new pair.
    #[must_use]
    pub const fn new(access: Jwt, refresh: Jwt) -> Self {
        Self { access, refresh }
    }

    /// Parse both tokens of a pair from raw strings.
    ///
    /// # Errors
    ///
    /// Returns the first [`TokenError`] encountered; a pair with one
    /// unusable token is unusable as a whole.
    pub fn parse(access: &str, refresh: &str) -> Result<Self, TokenError> {
        Ok(Self {
            access: Jwt::parse(access)?,
            refresh: Jwt::parse(refresh)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encoded_token(claims: &str) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(claims.as_bytes()),
            URL_SAFE_NO_PAD.encode(b"signature"),
        )
    }

    #[test]
    fn test_parse_well_formed_token() {
        let raw = encoded_token(r#"{"sub":"usr_1"}"#);
        let token = Jwt::parse(&raw).unwrap();
        assert_eq!(token.as_str(), raw);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let raw = encoded_token(r#"{"sub":"usr_1"}"#);
        let token = Jwt::parse(&format!("  {raw}\n")).unwrap();
        assert_eq!(token.as_str(), raw);
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Jwt::parse(""), Err(TokenError::Empty)));
        assert!(matches!(Jwt::parse("  "), Err(TokenError::Empty)));
    }

    #[test]
    fn test_parse_wrong_segment_count() {
        assert!(matches!(
            Jwt::parse("onlyonesegment"),
            Err(TokenError::MalformedStructure)
        ));
        assert!(matches!(
            Jwt::parse("two.segments"),
            Err(TokenError::MalformedStructure)
        ));
        assert!(matches!(
            Jwt::parse("a.b.c.d"),
            Err(TokenError::MalformedStructure)
        ));
    }

    #[test]
    fn test_parse_empty_segment() {
        assert!(matches!(
            Jwt::parse("a..c"),
            Err(TokenError::MalformedStructure)
        ));
    }

    #[test]
    fn test_parse_invalid_encoding() {
        assert!(matches!(
            Jwt::parse("ok$chars.are.not!base64url"),
            Err(TokenError::InvalidEncoding)
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = Jwt::parse(&encoded_token(r#"{"sub":"usr_1"}"#)).unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("eyJ"));
    }

    #[test]
    fn test_serde_transparent() {
        let raw = encoded_token(r#"{"sub":"usr_1"}"#);
        let token = Jwt::parse(&raw).unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{raw}\""));
    }

    #[test]
    fn test_pair_parse_rejects_one_bad_token() {
        let good = encoded_token(r#"{"sub":"usr_1"}"#);

        let pair = TokenPair::parse(&good, &good).unwrap();
        assert_eq!(pair.access.as_str(), good);

        assert!(TokenPair::parse(&good, "broken").is_err());
        assert!(TokenPair::parse("broken", &good).is_err());
    }
}
