//! Command implementations.
//!
//! Every command starts by building a [`Context`]: configuration from
//! the environment, the file-backed token store, and a session resolved
//! from whatever tokens that store holds. A session that cannot be
//! resolved (server unreachable) is logged and left anonymous-looking
//! rather than failing the command outright; the command itself then
//! fails with a precise error if it needed a signed-in session.

pub mod cart;
pub mod session;
pub mod wishlist;

use std::sync::Arc;

use thiserror::Error;

use tamarind_client::{
    ApiClient, ApiError, CartStore, ClientConfig, ConfigError, FileTokenStore, SessionError,
    SessionManager, StoreError, WishlistStore,
};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A cart or wishlist operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shared wiring behind every command.
pub struct Context {
    pub session: SessionManager,
    pub cart: CartStore,
    pub wishlist: WishlistStore,
}

impl Context {
    /// Build the client stack from the environment and resolve the
    /// session from stored tokens.
    pub async fn from_env() -> Result<Self, CommandError> {
        let config = ClientConfig::from_env()?;
        let store = Arc::new(FileTokenStore::open(config.token_path.clone()));
        let api = ApiClient::new(&config)?;
        let session = SessionManager::new(api.clone(), store);

        match session.initialize().await {
            Ok(status) => tracing::debug!("session resolved: {status}"),
            Err(err) => tracing::warn!("could not restore the session: {err}"),
        }

        Ok(Self {
            cart: CartStore::new(api.clone(), session.clone()),
            wishlist: WishlistStore::new(api, session.clone()),
            session,
        })
    }
}
