//! Order domain types.
//!
//! [`Order`] is the stored shape, holding ids only. [`OrderDetail`] is what
//! the listing endpoints return: the same order with its address and products
//! looked up, each `None` when the reference no longer resolves.

use serde::{Deserialize, Serialize};

use quickcart_core::{AddressId, Money, OrderId, ProductId, UserId};

use super::{Address, Product};

/// One line of an order as submitted and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: ProductId,
    pub quantity: u32,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address: Option<AddressId>,
    pub items: Vec<OrderItem>,
    /// Charged amount, surcharge included.
    pub amount: Money,
    /// Creation time, epoch milliseconds.
    pub date: i64,
}

/// An order line with its product resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemDetail {
    pub product: Option<Product>,
    pub quantity: u32,
}

/// An order with its address and products resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: OrderId,
    pub user_id: UserId,
    pub address: Option<Address>,
    pub items: Vec<OrderItemDetail>,
    pub amount: Money,
    pub date: i64,
}
