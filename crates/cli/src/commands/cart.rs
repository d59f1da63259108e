//! Cart commands.
//!
//! Each invocation is a fresh process, so commands that mutate an
//! existing line hydrate the local cart from the server first;
//! otherwise a remove or update would act on an empty local copy and
//! quietly do nothing.
//!
//! # Usage
//!
//! ```bash
//! tam cart add prod_123 --quantity 2
//! tam cart ls
//! tam cart update prod_123 5
//! tam cart remove prod_123
//! tam cart clear
//! ```

use tamarind_core::{ProductId, VariantId};

use super::{CommandError, Context};

/// Add a product to the cart.
pub async fn add(product: &str, quantity: u32, variant: Option<String>) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;
    let product = ProductId::new(product);
    let variant = variant.map(VariantId::new);

    ctx.cart.refresh().await?;
    ctx.cart.add(&product, quantity, variant).await?;

    tracing::info!(
        "Added. Cart now holds {} item(s), subtotal {}",
        ctx.cart.item_count(),
        ctx.cart.subtotal()
    );
    Ok(())
}

/// List the cart.
pub async fn ls() -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    ctx.cart.refresh().await?;

    let lines = ctx.cart.lines();
    if lines.is_empty() {
        tracing::info!("Cart is empty");
        return Ok(());
    }

    for line in &lines {
        tracing::info!(
            "  {} x{} - {} ({})",
            line.product.title,
            line.quantity,
            line.product.price,
            line.product.id
        );
    }
    tracing::info!(
        "{} item(s), subtotal {}",
        ctx.cart.item_count(),
        ctx.cart.subtotal()
    );
    Ok(())
}

/// Set the quantity of a cart line. Zero removes the line.
pub async fn update(product: &str, quantity: u32) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;
    let product = ProductId::new(product);

    ctx.cart.refresh().await?;
    ctx.cart.update_quantity(&product, quantity).await?;

    tracing::info!(
        "Updated. Cart now holds {} item(s), subtotal {}",
        ctx.cart.item_count(),
        ctx.cart.subtotal()
    );
    Ok(())
}

/// Remove a product from the cart.
pub async fn remove(product: &str) -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;
    let product = ProductId::new(product);

    ctx.cart.refresh().await?;
    ctx.cart.remove(&product).await?;

    tracing::info!("Removed. Cart now holds {} item(s)", ctx.cart.item_count());
    Ok(())
}

/// Empty the cart.
pub async fn clear() -> Result<(), CommandError> {
    let ctx = Context::from_env().await?;

    ctx.cart.clear().await?;

    tracing::info!("Cart cleared");
    Ok(())
}
