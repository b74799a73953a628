//! Product repository.

use async_trait::async_trait;
use rust_decimal::Decimal;

use quickcart_core::{Money, ProductId, UserId};

use super::{PgStore, RepositoryError, conflict_or_database};
use crate::models::Product;

/// Storage operations on products. The storefront core only reads them;
/// `create` exists for catalogue seeding.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Get a product by id.
    async fn get_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product. Returns `RepositoryError::Conflict` on duplicate id.
    async fn create(&self, product: &Product) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    user_id: UserId,
    name: String,
    description: String,
    category: String,
    price: Decimal,
    offer_price: Decimal,
    images: Vec<String>,
    date: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            category: row.category,
            price: Money::new(row.price),
            offer_price: Money::new(row.offer_price),
            images: row.images,
            date: row.date,
        }
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn get_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, user_id, name, description, category, price, offer_price, images, date
            FROM quickcart.products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn create(&self, product: &Product) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO quickcart.products
                (id, user_id, name, description, category, price, offer_price, images, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&product.id)
        .bind(&product.user_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price.amount())
        .bind(product.offer_price.amount())
        .bind(&product.images)
        .bind(product.date)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "product"))?;

        Ok(())
    }
}
