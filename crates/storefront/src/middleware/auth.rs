//! Caller identity extractor.
//!
//! Resolves the caller through the configured [`IdentityGateway`]. The
//! extractor never rejects: services decide what an anonymous caller may do,
//! so an unauthenticated request still gets the `{success: false}` envelope.
//!
//! [`IdentityGateway`]: crate::identity::IdentityGateway

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use quickcart_core::UserId;

use crate::error::set_sentry_user;
use crate::state::AppState;

/// The authenticated caller, if any.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CallerIdentity(caller): CallerIdentity) -> impl IntoResponse {
///     match caller {
///         Some(id) => format!("Hello, {id}!"),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub Option<UserId>);

impl CallerIdentity {
    /// Borrow the caller id.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let caller = state.identity().caller_identity(&parts.headers);

        if let Some(id) = &caller {
            tracing::Span::current().record("user_id", id.as_str());
            set_sentry_user(id);
        }

        Ok(Self(caller))
    }
}
