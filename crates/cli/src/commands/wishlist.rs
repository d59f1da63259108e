//! Wishlist commands.
//!
//! Mutating commands hydrate the local wishlist from the server first,
//! for the same reason the cart commands do: a fresh process starts
//! with an empty local copy.
//!
//! # Usage
//!
//! ```bash
//! tam wishlist toggle prod_456
//! tam wishlist ls
//! tam wishlist remove prod_456
//! tam wishlist clear
//! ```

use tamarind_core::ProductId;

use super::{CommandError, Context};

/// Add or remove a product, whichever applies.
pub async fn toggle(product: &str) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;
    let product = ProductId::new(product);

    ctx.wishlist.refresh().await?;
    ctx.wishlist.toggle(&product).await?;

    if ctx.wishlist.contains(&product) {
        tracing::info!("Added to wishlist ({} entries)", ctx.wishlist.len());
    } else {
        tracing::info!("Removed from wishlist ({} entries)", ctx.wishlist.len());
    }
    Ok(())
}

/// List the wishlist.
pub async fn ls() -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    ctx.wishlist.refresh().await?;

    let entries = ctx.wishlist.entries();
    if entries.is_empty() {
        tracing::info!("Wishlist is empty");
        return Ok(());
    }

    for entry in &entries {
        match &entry.product {
            Some(product) => {
                tracing::info!("  {} - {} ({})", product.title, product.price, product.id);
            }
            None => tracing::info!("  {} (syncing)", entry.product_id),
        }
    }
    tracing::info!("{} entries", entries.len());
    Ok(())
}

/// Remove a product from the wishlist.
pub async fn remove(product: &str) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;
    let product = ProductId::new(product);

    ctx.wishlist.refresh().await?;
    ctx.wishlist.remove(&product).await?;

    tracing::info!("Removed from wishlist ({} entries)", ctx.wishlist.len());
    Ok(())
}

/// Empty the wishlist.
pub async fn clear() -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    ctx.wishlist.clear().await?;

    tracing::info!("Wishlist cleared");
    Ok(())
}
