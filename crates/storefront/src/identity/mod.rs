//! Identity-provider integration.
//!
//! - [`IdentityGateway`] resolves the caller of a request to a [`UserId`]
//!   ([`JwtIdentity`] in production, [`HeaderIdentity`] behind a trusted
//!   proxy or in tests).
//! - [`SellerOracle`] answers whether a user may see every order.
//! - [`WebhookVerifier`] authenticates lifecycle webhooks from the provider.

pub mod header;
pub mod jwt;
pub mod seller;
pub mod webhook;

use axum::http::HeaderMap;

use quickcart_core::UserId;

pub use header::HeaderIdentity;
pub use jwt::JwtIdentity;
pub use seller::{IdentityApiSellerOracle, SellerAllowList, SellerOracle};
pub use webhook::{WebhookError, WebhookVerifier};

/// Resolves the caller of a request.
pub trait IdentityGateway: Send + Sync {
    /// The authenticated caller, or `None` if the request carries no valid
    /// credentials.
    fn caller_identity(&self, headers: &HeaderMap) -> Option<UserId>;
}
