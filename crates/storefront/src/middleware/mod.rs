//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (add unique ID to each request)
//!
//! Caller identification is an extractor ([`CallerIdentity`]) rather than a
//! layer, so only the `/api` handlers pay for token verification.

pub mod auth;
pub mod request_id;

pub use auth::CallerIdentity;
pub use request_id::{RequestId, make_request_span, request_id_middleware};
