//! Catalogue product.

use serde::{Deserialize, Serialize};

use quickcart_core::{Money, ProductId, UserId};

/// A product listed by a seller.
///
/// Only `offer_price` takes part in order pricing; the remaining fields are
/// returned to clients when orders are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    /// Seller who listed the product.
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// List price before discount.
    pub price: Money,
    /// Price actually charged.
    pub offer_price: Money,
    #[serde(default)]
    pub images: Vec<String>,
    /// Listing time, epoch milliseconds.
    pub date: i64,
}
