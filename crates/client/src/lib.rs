//! Tamarind Client - session and collection engine for the storefront API.
//!
//! This crate owns the client side of a storefront account: token
//! persistence, the session lifecycle, and the cart and wishlist
//! collections with optimistic mutations over the REST API.
//!
//! # Architecture
//!
//! - [`config`] - configuration loaded from environment variables
//! - [`api`] - typed REST transport with a four-class error taxonomy and
//!   no retry policy of its own
//! - [`session`] - the token store and the session manager, which is the
//!   only component allowed to write tokens
//! - [`stores`] - the optimistic cart and wishlist collections plus the
//!   toggle debouncer
//!
//! Every collection mutation follows one protocol: capture a snapshot,
//! apply the change locally, dispatch the request, then confirm on success
//! or revert the touched key on failure. See [`stores`] for details.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod session;
pub mod stores;

pub use api::{ApiClient, ApiError};
pub use config::{ClientConfig, ConfigError};
pub use session::{
    FileTokenStore, MemoryTokenStore, SessionError, SessionManager, SessionStatus, TokenStore,
};
pub use stores::{CartLine, CartStore, StoreError, WishlistEntry, WishlistStore};
