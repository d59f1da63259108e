//! Core types for Tamarind.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod product;
pub mod role;
pub mod token;
pub mod user;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use product::ProductSummary;
pub use role::UserRole;
pub use token::{Jwt, TokenError, TokenPair};
pub use user::{User, UserUpdate};
