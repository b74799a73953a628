//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (store ping)
//!
//! # Orders (JSON envelope, always 200)
//! POST /api/order/create         - Submit the caller's cart
//! GET  /api/order/list           - Caller's orders
//! GET  /api/order/seller-orders  - Every order (sellers only)
//!
//! # User (JSON envelope, always 200)
//! GET  /api/user/data            - Caller's user record
//!
//! # Webhooks
//! POST /api/webhooks/identity    - Signed identity-provider events
//! ```

pub mod health;
pub mod orders;
pub mod user;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(orders::create))
        .route("/list", get(orders::list))
        .route("/seller-orders", get(orders::seller_orders))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/data", get(user::data))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/identity", post(webhooks::identity))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/order", order_routes())
        .nest("/api/user", user_routes())
        .nest("/api/webhooks", webhook_routes())
}
