//! Tamarind Core - Shared types library.
//!
//! This crate provides common types used across all Tamarind components:
//! - `client` - Session and collection engine for the storefront API
//! - `cli` - Command-line shopping client
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no persistence. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, money, tokens,
//!   and the user model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
