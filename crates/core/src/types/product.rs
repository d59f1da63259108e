//! Product summary as catalog endpoints return it.

use serde::{Deserialize, Serialize};

use crate::types::id::ProductId;
use crate::types::money::Money;

/// The slice of a product the client needs before it can place the product
/// in a collection: enough to render a line and compute totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    #[serde(default)]
    pub image_url: Option<String>,
}
