//! Address repository.

use async_trait::async_trait;

use quickcart_core::{AddressId, UserId};

use super::{PgStore, RepositoryError, conflict_or_database};
use crate::models::Address;

/// Storage operations on shipping addresses.
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Get an address by id.
    async fn get_by_id(&self, id: &AddressId) -> Result<Option<Address>, RepositoryError>;

    /// Insert an address. Returns `RepositoryError::Conflict` on duplicate id.
    async fn create(&self, address: &Address) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    full_name: String,
    phone_number: String,
    pincode: String,
    area: String,
    city: String,
    state: String,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            full_name: row.full_name,
            phone_number: row.phone_number,
            pincode: row.pincode,
            area: row.area,
            city: row.city,
            state: row.state,
        }
    }
}

#[async_trait]
impl AddressRepository for PgStore {
    async fn get_by_id(&self, id: &AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, full_name, phone_number, pincode, area, city, state
            FROM quickcart.addresses
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    async fn create(&self, address: &Address) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO quickcart.addresses
                (id, user_id, full_name, phone_number, pincode, area, city, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.full_name)
        .bind(&address.phone_number)
        .bind(&address.pincode)
        .bind(&address.area)
        .bind(&address.city)
        .bind(&address.state)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "address"))?;

        Ok(())
    }
}
