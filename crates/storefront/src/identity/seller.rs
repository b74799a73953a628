//! Seller authorization.
//!
//! Sellers may list every order. The capability lives with the identity
//! provider as `public_metadata.role == "seller"`; a static allow-list can be
//! configured alongside or instead of it.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{instrument, warn};
use url::Url;

use quickcart_core::UserId;

/// Role value granting seller access.
const SELLER_ROLE: &str = "seller";

/// Answers whether a user is a seller.
#[async_trait]
pub trait SellerOracle: Send + Sync {
    /// Returns `true` if `user` may see every order. Lookup failures count as
    /// `false`.
    async fn is_seller(&self, user: &UserId) -> bool;
}

/// Fixed set of seller ids.
#[derive(Debug, Clone, Default)]
pub struct SellerAllowList {
    sellers: HashSet<UserId>,
}

impl SellerAllowList {
    pub fn new(sellers: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            sellers: sellers.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sellers.is_empty()
    }
}

#[async_trait]
impl SellerOracle for SellerAllowList {
    async fn is_seller(&self, user: &UserId) -> bool {
        self.sellers.contains(user)
    }
}

/// Errors from the identity provider's user API.
#[derive(Debug, Error)]
pub enum IdentityApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The configured URL or secret is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    #[serde(default)]
    public_metadata: PublicMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetadata {
    role: Option<String>,
}

/// Looks the user up in the identity provider's backend API.
#[derive(Clone)]
pub struct IdentityApiSellerOracle {
    client: reqwest::Client,
    base_url: Url,
    allow_list: SellerAllowList,
}

impl IdentityApiSellerOracle {
    /// Create a client for `base_url` authenticated with `secret`.
    ///
    /// Users in `allow_list` are sellers without an API round-trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(
        base_url: Url,
        secret: &SecretString,
        allow_list: SellerAllowList,
    ) -> Result<Self, IdentityApiError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", secret.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| IdentityApiError::Config(format!("invalid API secret: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            allow_list,
        })
    }

    /// Fetch the user's role from `GET {base}/v1/users/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers non-2xx.
    pub async fn fetch_role(&self, user: &UserId) -> Result<Option<String>, IdentityApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| IdentityApiError::Config("base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(["v1", "users", user.as_str()]);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IdentityApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let user: ApiUser = response.json().await?;
        Ok(user.public_metadata.role)
    }
}

#[async_trait]
impl SellerOracle for IdentityApiSellerOracle {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn is_seller(&self, user: &UserId) -> bool {
        if self.allow_list.is_seller(user).await {
            return true;
        }
        match self.fetch_role(user).await {
            Ok(role) => role.as_deref() == Some(SELLER_ROLE),
            Err(e) => {
                warn!(error = %e, "Seller lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_list() {
        let sellers = SellerAllowList::new([UserId::new("seller_1")]);
        assert!(sellers.is_seller(&UserId::new("seller_1")).await);
        assert!(!sellers.is_seller(&UserId::new("buyer_1")).await);
    }

    #[test]
    fn test_api_user_role() {
        let user: ApiUser = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "public_metadata": { "role": "seller" }
        }))
        .unwrap();
        assert_eq!(user.public_metadata.role.as_deref(), Some(SELLER_ROLE));

        let user: ApiUser = serde_json::from_value(serde_json::json!({ "id": "user_2" })).unwrap();
        assert_eq!(user.public_metadata.role, None);
    }

    #[tokio::test]
    async fn test_unreachable_api_is_not_seller() {
        let oracle = IdentityApiSellerOracle::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            &SecretString::from("sk_test"),
            SellerAllowList::new([UserId::new("seller_1")]),
        )
        .unwrap();

        assert!(oracle.is_seller(&UserId::new("seller_1")).await);
        assert!(!oracle.is_seller(&UserId::new("buyer_1")).await);
    }
}
