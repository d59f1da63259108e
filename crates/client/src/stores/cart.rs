//! Optimistic shopping cart.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use tamarind_core::{ProductId, ProductSummary, VariantId};

use crate::api::ApiClient;
use crate::session::SessionManager;

use super::{EntryId, Keyed, OptimisticEntry, OptimisticList, StoreError};

const PRODUCT_CACHE_CAPACITY: u64 = 1_000;
const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);

/// One product's line in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product: ProductSummary,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

impl Keyed for CartLine {
    fn key(&self) -> &ProductId {
        &self.product.id
    }
}

/// Shopping cart with optimistic mutations.
///
/// Cheap to clone; clones share one cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    session: SessionManager,
    lines: OptimisticList<CartLine>,
    products: Cache<ProductId, ProductSummary>,
}

impl CartStore {
    #[must_use]
    pub fn new(api: ApiClient, session: SessionManager) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                session,
                lines: OptimisticList::default(),
                products: Cache::builder()
                    .max_capacity(PRODUCT_CACHE_CAPACITY)
                    .time_to_live(PRODUCT_CACHE_TTL)
                    .build(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `quantity` of a product. An existing line for the same
    /// product merges quantities instead of duplicating.
    ///
    /// The product summary is fetched before the local change: a line
    /// without a real title and price would corrupt every derived
    /// total, so a failed lookup aborts the add with nothing changed.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session, for a zero quantity, when the
    /// product lookup fails, or when the server rejects the line; in
    /// the last case the local change is rolled back first.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        product_id: &ProductId,
        quantity: u32,
        variant_id: Option<VariantId>,
    ) -> Result<(), StoreError> {
        self.require_authenticated()?;
        if quantity == 0 {
            return Err(StoreError::Rejected("quantity must be at least 1".to_owned()));
        }

        let product = self.product_summary(product_id).await?;

        let snapshot = self.inner.lines.snapshot();
        self.inner.lines.apply(|lines| {
            match lines.iter_mut().find(|entry| entry.payload.key() == product_id) {
                Some(entry) => {
                    entry.payload.quantity = entry.payload.quantity.saturating_add(quantity);
                    entry.pending = true;
                }
                None => lines.push(OptimisticEntry::pending(CartLine {
                    product,
                    variant_id: variant_id.clone(),
                    quantity,
                })),
            }
        });

        let outcome = self
            .inner
            .session
            .authorized(async |token| {
                self.inner
                    .api
                    .add_cart_line(&token, product_id, variant_id.as_ref(), quantity)
                    .await
            })
            .await;

        match outcome {
            Ok(()) => {
                self.inner.lines.confirm(product_id);
                Ok(())
            }
            Err(err) => {
                debug!(product = %product_id, error = %err, "add rejected, rolling back");
                self.inner.lines.revert(product_id, &snapshot);
                Err(err.into())
            }
        }
    }

    /// Set the quantity of an existing line. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session, for a product that is not in
    /// the cart, or when the server rejects the update; in the last
    /// case the local change is rolled back first.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        self.require_authenticated()?;
        if quantity == 0 {
            return self.remove(product_id).await;
        }

        let snapshot = self.inner.lines.snapshot();
        let found = self.inner.lines.apply(|lines| {
            match lines.iter_mut().find(|entry| entry.payload.key() == product_id) {
                Some(entry) => {
                    entry.payload.quantity = quantity;
                    entry.pending = true;
                    true
                }
                None => false,
            }
        });
        if !found {
            return Err(StoreError::Rejected("that item is not in the cart".to_owned()));
        }

        let outcome = self
            .inner
            .session
            .authorized(async |token| {
                self.inner
                    .api
                    .update_cart_line(&token, product_id, quantity)
                    .await
            })
            .await;

        match outcome {
            Ok(()) => {
                self.inner.lines.confirm(product_id);
                Ok(())
            }
            Err(err) => {
                debug!(product = %product_id, error = %err, "quantity update rejected, rolling back");
                self.inner.lines.revert(product_id, &snapshot);
                Err(err.into())
            }
        }
    }

    /// Remove a product's line. Removing a product that is not in the
    /// cart is a no-op.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session or when the server rejects the
    /// removal; in the last case the line is restored.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<(), StoreError> {
        self.require_authenticated()?;

        let snapshot = self.inner.lines.snapshot();
        let removed = self.inner.lines.apply(|lines| {
            let before = lines.len();
            lines.retain(|entry| entry.payload.key() != product_id);
            lines.len() != before
        });
        if !removed {
            return Ok(());
        }

        let outcome = self
            .inner
            .session
            .authorized(async |token| self.inner.api.remove_cart_line(&token, product_id).await)
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(product = %product_id, error = %err, "removal rejected, rolling back");
                self.inner.lines.revert(product_id, &snapshot);
                Err(err.into())
            }
        }
    }

    /// Empty the cart.
    ///
    /// Unlike the other mutations this one is not optimistic: the local
    /// copy empties only after the server confirms, because a reverted
    /// whole-cart wipe would also resurrect lines that other in-flight
    /// mutations already changed.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session or when the server rejects;
    /// the local cart is untouched on failure.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.require_authenticated()?;

        self.inner
            .session
            .authorized(async |token| self.inner.api.clear_cart(&token).await)
            .await?;

        self.inner.lines.clear();
        Ok(())
    }

    /// Replace local lines with the server's copy, keeping lines whose
    /// own mutation is still in flight.
    ///
    /// # Errors
    ///
    /// Fails without a signed-in session or when the fetch fails; the
    /// local cart is untouched on failure.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), StoreError> {
        self.require_authenticated()?;

        let wire = self
            .inner
            .session
            .authorized(async |token| self.inner.api.fetch_cart(&token).await)
            .await?;

        let canonical = wire
            .into_iter()
            .map(|line| OptimisticEntry {
                id: EntryId::local(),
                payload: CartLine {
                    product: line.product,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                },
                pending: false,
            })
            .collect();
        self.inner.lines.install_canonical(canonical);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Current lines, optimistic changes included.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        self.inner
            .lines
            .entries()
            .into_iter()
            .map(|entry| entry.payload)
            .collect()
    }

    /// Number of items in the cart, counting quantities. Recomputed on
    /// every call.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.lines.read(|lines| {
            lines
                .iter()
                .fold(0_u32, |count, entry| count.saturating_add(entry.payload.quantity))
        })
    }

    /// Sum of price times quantity across the cart. A line whose price
    /// does not parse contributes zero instead of failing the total.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.inner.lines.read(|lines| {
            lines
                .iter()
                .map(|entry| {
                    entry.payload.product.price.decimal() * Decimal::from(entry.payload.quantity)
                })
                .sum()
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lines.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn require_authenticated(&self) -> Result<(), StoreError> {
        if self.inner.session.is_authenticated() {
            Ok(())
        } else {
            Err(StoreError::NotAuthenticated)
        }
    }

    /// Product summary from the cache, fetched on a miss.
    async fn product_summary(&self, id: &ProductId) -> Result<ProductSummary, StoreError> {
        if let Some(product) = self.inner.products.get(id).await {
            return Ok(product);
        }

        let product = self.inner.api.fetch_product(id).await?;
        self.inner
            .products
            .insert(id.clone(), product.clone())
            .await;
        Ok(product)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::MemoryTokenStore;
    use tamarind_core::Money;

    fn dead_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    fn anonymous_cart() -> CartStore {
        let config = ClientConfig::new(dead_endpoint(), "/tmp/unused-tokens.json");
        let api = ApiClient::new(&config).unwrap();
        let session = SessionManager::new(api.clone(), Arc::new(MemoryTokenStore::new()));
        session.logout();
        CartStore::new(api, session)
    }

    fn line(product: &str, price: &str, quantity: u32) -> OptimisticEntry<CartLine> {
        let mut entry = OptimisticEntry::pending(CartLine {
            product: ProductSummary {
                id: ProductId::new(product),
                title: product.to_owned(),
                price: Money::new(price, "USD"),
                image_url: None,
            },
            variant_id: None,
            quantity,
        });
        entry.pending = false;
        entry
    }

    #[tokio::test]
    async fn test_mutations_require_a_signed_in_session() {
        let cart = anonymous_cart();
        let product = ProductId::new("prod_1");

        assert!(matches!(
            cart.add(&product, 1, None).await,
            Err(StoreError::NotAuthenticated)
        ));
        assert!(matches!(
            cart.update_quantity(&product, 2).await,
            Err(StoreError::NotAuthenticated)
        ));
        assert!(matches!(
            cart.remove(&product).await,
            Err(StoreError::NotAuthenticated)
        ));
        assert!(matches!(cart.clear().await, Err(StoreError::NotAuthenticated)));
        assert!(matches!(cart.refresh().await, Err(StoreError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_item_count_sums_quantities() {
        let cart = anonymous_cart();
        cart.inner.lines.apply(|lines| {
            lines.push(line("prod_a", "10.00", 2));
            lines.push(line("prod_b", "5.00", 3));
        });

        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.lines().len(), 2);
    }

    #[tokio::test]
    async fn test_subtotal_multiplies_price_by_quantity() {
        let cart = anonymous_cart();
        cart.inner.lines.apply(|lines| {
            lines.push(line("prod_a", "24.99", 2));
            lines.push(line("prod_b", "10.50", 1));
        });

        assert_eq!(cart.subtotal(), Decimal::new(6048, 2));
    }

    #[tokio::test]
    async fn test_subtotal_counts_malformed_price_as_zero() {
        let cart = anonymous_cart();
        cart.inner.lines.apply(|lines| {
            lines.push(line("prod_a", "24.99", 2));
            lines.push(line("prod_b", "N/A", 5));
        });

        assert_eq!(cart.subtotal(), Decimal::new(4998, 2));
    }

    #[tokio::test]
    async fn test_empty_cart_derives_zero() {
        let cart = anonymous_cart();

        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.subtotal(), Decimal::ZERO);
    }
}
