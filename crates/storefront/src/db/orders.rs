//! Order repository.
//!
//! Orders are inserted only by the `order.created` consumer and read by the
//! listing endpoints. Listing is always newest first.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::types::Json;

use quickcart_core::{AddressId, Money, OrderId, UserId};

use super::{PgStore, RepositoryError};
use crate::models::{Order, OrderItem};

/// Which orders to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Restrict to one owner; `None` lists every order.
    pub user_id: Option<UserId>,
}

impl OrderFilter {
    /// Every order in the store.
    #[must_use]
    pub const fn all() -> Self {
        Self { user_id: None }
    }

    /// Orders owned by one user.
    #[must_use]
    pub const fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Returns true if the order passes this filter.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id
            .as_ref()
            .is_none_or(|user_id| *user_id == order.user_id)
    }
}

/// Storage operations on orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order. Returns `false` if an order with this id already
    /// exists, leaving the stored order unchanged.
    async fn create(&self, order: &Order) -> Result<bool, RepositoryError>;

    /// List orders matching `filter`, sorted by `date` descending.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    address: Option<AddressId>,
    items: Json<Vec<OrderItem>>,
    amount: Decimal,
    date: i64,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            address: row.address,
            items: row.items.0,
            amount: Money::new(row.amount),
            date: row.date,
        }
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn create(&self, order: &Order) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO quickcart.orders (id, user_id, address, items, amount, date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.address.as_ref())
        .bind(Json(&order.items))
        .bind(order.amount.amount())
        .bind(order.date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, address, items, amount, date
            FROM quickcart.orders
            WHERE ($1::text IS NULL OR user_id = $1)
            ORDER BY date DESC
            ",
        )
        .bind(filter.user_id.as_ref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }
}
