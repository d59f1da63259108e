//! Session-level error taxonomy.

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by session operations.
///
/// Messages are written for direct display: callers show
/// `err.to_string()` without further mapping.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The email address failed validation before any request was made.
    #[error(transparent)]
    InvalidEmail(#[from] tamarind_core::EmailError),

    /// The server refused the operation. Carries the server's own
    /// message when one was parseable, a generic one otherwise.
    #[error("{0}")]
    Rejected(String),

    /// The request never completed. The session is left exactly as it
    /// was; the caller may retry.
    #[error("could not reach the server, check your connection and try again")]
    Network(String),

    /// The session manager was shut down while the operation was in
    /// flight. Nothing was committed.
    #[error("session manager was shut down")]
    ShutDown,
}

impl SessionError {
    /// True when the operation failed without a server verdict.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => Self::Rejected(message),
            ApiError::Rejected { message, .. } => Self::Rejected(message),
            ApiError::Network(detail) => Self::Network(detail),
            ApiError::Malformed(_) => {
                Self::Rejected("the server returned an unexpected response".to_owned())
            }
        }
    }
}
