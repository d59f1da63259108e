//! Optimistic wishlist with debounced toggling.

use std::sync::Arc;

use tracing::{debug, instrument};

use tamarind_core::{ProductId, ProductSummary, WishlistEntryId};

use crate::api::ApiClient;
use crate::session::SessionManager;

use super::{EntryId, Keyed, OptimisticEntry, OptimisticList, StoreError, ToggleDebouncer};

/// One wishlist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistEntry {
    pub product_id: ProductId,
    /// Known once the canonical copy lands; an optimistic add starts
    /// without it.
    pub product: Option<ProductSummary>,
}

impl Keyed for WishlistEntry {
    fn key(&self) -> &ProductId {
        &self.product_id
    }
}

/// Wishlist with optimistic mutations.
///
/// Cheap to clone; clones share one wishlist.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistStoreInner>,
}

struct WishlistStoreInner {
    api: ApiClient,
    session: SessionManager,
    entries: OptimisticList<WishlistEntry>,
    debouncer: ToggleDebouncer,
}

impl WishlistStore {
    #[must_use]
    pub fn new(api: ApiClient, session: SessionManager) -> Self {
        Self {
            inner: Arc::new(WishlistStoreInner {
                api,
                session,
                entries: OptimisticList::default(),
                debouncer: ToggleDebouncer::new(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Flip a product's wishlist membership.
    ///
    /// Repeat toggles of the same product inside the debounce window
    /// are dropped silently, so a double-click produces one server
    /// round-trip, not two.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session, or as the underlying add or
    /// remove fails.
    #[instrument(skip(self))]
    pub async fn toggle(&self, product_id: &ProductId) -> Result<(), StoreError> {
        self.require_authenticated()?;

        if !self.inner.debouncer.should_proceed(product_id) {
            debug!(product = %product_id, "toggle debounced");
            return Ok(());
        }

        if self.contains(product_id) {
            self.remove(product_id).await
        } else {
            self.add(product_id).await
        }
    }

    /// Add a product. Adding a product already present is a no-op.
    ///
    /// On success the list is refetched so the new entry carries its
    /// server-assigned ID. If that refetch fails, the entry stays
    /// pending locally and the failure is surfaced; the add itself has
    /// already been accepted by the server.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session or when the server rejects the
    /// entry; in that case the local change is rolled back first.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: &ProductId) -> Result<(), StoreError> {
        self.require_authenticated()?;
        if self.contains(product_id) {
            return Ok(());
        }

        let snapshot = self.inner.entries.snapshot();
        self.inner.entries.apply(|entries| {
            entries.push(OptimisticEntry::pending(WishlistEntry {
                product_id: product_id.clone(),
                product: None,
            }));
        });

        let outcome = self
            .inner
            .session
            .authorized(async |token| self.inner.api.add_wishlist_entry(&token, product_id).await)
            .await;

        if let Err(err) = outcome {
            debug!(product = %product_id, error = %err, "add rejected, rolling back");
            self.inner.entries.revert(product_id, &snapshot);
            return Err(err.into());
        }

        self.refresh().await
    }

    /// Remove a product. Removing a product that is not on the list is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session, for an entry still waiting on
    /// its server ID, or when the server rejects the removal; in the
    /// last case the entry is restored.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<(), StoreError> {
        self.require_authenticated()?;

        let Some(entry) = self.inner.entries.find(product_id) else {
            return Ok(());
        };
        let EntryId::Server(raw_id) = entry.id else {
            return Err(StoreError::Rejected(
                "that item is still syncing, try again in a moment".to_owned(),
            ));
        };
        let entry_id = WishlistEntryId::from(raw_id);

        let snapshot = self.inner.entries.snapshot();
        self.inner
            .entries
            .apply(|entries| entries.retain(|entry| entry.payload.key() != product_id));

        let outcome = self
            .inner
            .session
            .authorized(async |token| {
                self.inner.api.remove_wishlist_entry(&token, &entry_id).await
            })
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(product = %product_id, error = %err, "removal rejected, rolling back");
                self.inner.entries.revert(product_id, &snapshot);
                Err(err.into())
            }
        }
    }

    /// Empty the wishlist.
    ///
    /// Like the cart's clear, this is not optimistic: the local copy
    /// empties only after the server confirms.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session or when the server rejects;
    /// the local list is untouched on failure.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.require_authenticated()?;

        self.inner
            .session
            .authorized(async |token| self.inner.api.clear_wishlist(&token).await)
            .await?;

        self.inner.entries.clear();
        Ok(())
    }

    /// Replace local entries with the server's copy, keeping entries
    /// whose own mutation is still in flight.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session or when the fetch fails; the
    /// local list is untouched on failure.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.require_authenticated()?;

        let wire = self
            .inner
            .session
            .authorized(async |token| self.inner.api.fetch_wishlist(&token).await)
            .await?;

        let canonical = wire
            .into_iter()
            .map(|entry| OptimisticEntry {
                id: EntryId::Server(entry.id.into_inner()),
                payload: WishlistEntry {
                    product_id: entry.product.id.clone(),
                    product: Some(entry.product),
                },
                pending: false,
            })
            .collect();
        self.inner.entries.install_canonical(canonical);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Current entries, optimistic changes included.
    #[must_use]
    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.inner
            .entries
            .entries()
            .into_iter()
            .map(|entry| entry.payload)
            .collect()
    }

    /// True when the product is on the list, optimistically or
    /// canonically.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.inner.entries.contains(product_id)
    }

    /// Number of entries. Recomputed on every call.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn require_authenticated(&self) -> Result<(), StoreError> {
        if self.inner.session.is_authenticated() {
            Ok(())
        } else {
            Err(StoreError::NotAuthenticated)
        }
    }
}
