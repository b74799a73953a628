//! User repository.
//!
//! Users are written by identity sync (create, partial update, delete) and by
//! order submission (cart clearing). Reads go by primary key.

use async_trait::async_trait;
use sqlx::types::Json;

use quickcart_core::UserId;

use super::postgres::count_from_i64;
use super::{PgStore, RepositoryError, conflict_or_database};
use crate::models::{CartItems, User, UserPatch};

/// Storage operations on users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Get a user by id.
    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// Insert a new user.
    ///
    /// Returns `RepositoryError::Conflict` if a user with the same id exists.
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;

    /// Apply a partial update. Returns the updated user, or `None` if no user
    /// has this id.
    async fn update(&self, id: &UserId, patch: &UserPatch)
    -> Result<Option<User>, RepositoryError>;

    /// Overwrite a user's cart. Returns `false` if no user has this id.
    async fn set_cart_items(&self, id: &UserId, cart: &CartItems) -> Result<bool, RepositoryError>;

    /// Delete a user. Returns `false` if no user had this id.
    async fn delete(&self, id: &UserId) -> Result<bool, RepositoryError>;

    /// Number of stored users.
    async fn count(&self) -> Result<u64, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    name: String,
    image_url: String,
    cart_items: Json<CartItems>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            image_url: row.image_url,
            cart_items: row.cart_items.0,
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, image_url, cart_items
            FROM quickcart.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO quickcart.users (id, email, name, image_url, cart_items)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.image_url)
        .bind(Json(&user.cart_items))
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "user"))?;

        Ok(())
    }

    async fn update(
        &self,
        id: &UserId,
        patch: &UserPatch,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE quickcart.users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                image_url = COALESCE($4, image_url),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, image_url, cart_items
            ",
        )
        .bind(id)
        .bind(patch.email.as_deref())
        .bind(patch.name.as_deref())
        .bind(patch.image_url.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn set_cart_items(&self, id: &UserId, cart: &CartItems) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE quickcart.users
            SET cart_items = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(Json(cart))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM quickcart.users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quickcart.users")
            .fetch_one(&self.pool)
            .await?;

        count_from_i64(count)
    }
}
