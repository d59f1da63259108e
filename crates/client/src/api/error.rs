//! API error taxonomy.

use thiserror::Error;

/// Errors produced by [`ApiClient`](super::ApiClient) calls.
///
/// Every transport outcome collapses into one of four classes so callers
/// can react without inspecting response bodies themselves: auth
/// rejections drive the token refresh path, other rejections carry the
/// server's message verbatim when the body is parseable, network failures
/// signal that state must be left untouched upstream, and malformed
/// success bodies are contained here instead of leaking parse errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server refused the token or credentials (401 or 403).
    #[error("{0}")]
    Unauthorized(String),

    /// The server rejected the request for any other reason.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided message when parseable, generic otherwise.
        message: String,
    },

    /// The request never completed (connect failure, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// A success response whose body failed to parse.
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ApiError {
    /// True for transport failures, where callers must leave local and
    /// persisted state exactly as it was.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// True when the server explicitly refused the token or credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // Status-bearing errors never reach here: responses are read as
        // status + text before parsing. Whatever remains is transport.
        Self::Network(err.to_string())
    }
}
