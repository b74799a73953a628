//! Shipping address.

use serde::{Deserialize, Serialize};

use quickcart_core::{AddressId, UserId};

/// A saved shipping address. Orders reference it by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone_number: String,
    pub pincode: String,
    pub area: String,
    pub city: String,
    pub state: String,
}
