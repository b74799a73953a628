//! Event payload shapes.

use serde::{Deserialize, Serialize};

use quickcart_core::{AddressId, Money, UserId};

use crate::models::OrderItem;

/// Payload of `order.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub user_id: UserId,
    pub address: Option<AddressId>,
    pub items: Vec<OrderItem>,
    pub amount: Money,
    pub date: i64,
}

/// One email entry of an identity-provider user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddressEntry {
    #[serde(default)]
    pub email_address: Option<String>,
}

/// User record as sent by the identity provider on `identity/user.*`.
///
/// Every field is optional; validation is left to the sync logic so that a
/// malformed payload can be skipped instead of redelivered forever.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityUserPayload {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_addresses: Option<Vec<EmailAddressEntry>>,
    pub image_url: Option<String>,
}

impl IdentityUserPayload {
    /// Decode from event data, treating `null` as an empty payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is present but not an object of this shape.
    pub fn from_value(data: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if data.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(data)
    }

    /// Non-blank subject id.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// First email address, if any.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .as_deref()?
            .first()?
            .email_address
            .as_deref()
    }
}
