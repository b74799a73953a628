//! User domain types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use quickcart_core::{ProductId, UserId};

/// Cart contents: product id to quantity.
pub type CartItems = BTreeMap<ProductId, u32>;

/// A storefront user, mirrored from the identity provider.
///
/// `id` is the identity provider's subject, so the same value identifies the
/// caller on every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub image_url: String,
    #[serde(default)]
    pub cart_items: CartItems,
}

/// Partial update applied by identity sync.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

impl UserPatch {
    /// Returns true if the patch would not change any field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.image_url.is_none()
    }

    /// Apply this patch to a user in place.
    pub fn apply(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(image_url) = &self.image_url {
            user.image_url.clone_from(image_url);
        }
    }
}
