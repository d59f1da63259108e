//! Per-product rate limit for wishlist toggles.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use tamarind_core::ProductId;

/// Repeat toggles of one product inside this window are dropped.
pub const TOGGLE_WINDOW: Duration = Duration::from_millis(500);

/// Drops rapid repeat toggles of the same product.
///
/// Only accepted toggles arm the window; a dropped attempt does not
/// extend it. Different products never interfere with each other.
#[derive(Debug, Default)]
pub struct ToggleDebouncer {
    stamps: Mutex<HashMap<ProductId, Instant>>,
}

impl ToggleDebouncer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the toggle should run, false when it lands inside the
    /// window armed by the previous accepted toggle for this product.
    pub fn should_proceed(&self, key: &ProductId) -> bool {
        let now = Instant::now();
        let mut stamps = self.stamps.lock().unwrap_or_else(PoisonError::into_inner);

        // Expired stamps are pruned on every pass, so presence in the
        // map means the window is still armed.
        stamps.retain(|_, accepted| now.duration_since(*accepted) < TOGGLE_WINDOW);

        if stamps.contains_key(key) {
            return false;
        }
        stamps.insert(key.clone(), now);
        true
    }
}
