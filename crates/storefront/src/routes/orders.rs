//! Order route handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use tracing::instrument;

use quickcart_core::AddressId;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::CallerIdentity;
use crate::models::OrderItem;
use crate::response::Envelope;
use crate::services::orders::ORDER_PLACED;
use crate::services::{NewOrder, OrderError, OrderScope};
use crate::state::AppState;

/// Body of `POST /api/order/create`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateOrderRequest {
    pub address: Option<AddressId>,
    pub items: Vec<OrderItem>,
}

/// Submit the caller's cart as an order.
///
/// The caller is checked before the body, so an anonymous request with a
/// malformed body still reports `User not authenticated`.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Envelope> {
    let caller = caller.user_id().ok_or(OrderError::Unauthenticated)?;

    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Malformed order body");
        OrderError::InvalidInput
    })?;

    let item_count = request.items.len().to_string();
    add_breadcrumb(
        "order",
        "Order submitted",
        Some(&[("item_count", item_count.as_str())]),
    );

    state
        .orders()
        .submit(
            Some(caller),
            NewOrder {
                address: request.address,
                items: request.items,
            },
        )
        .await?;

    Ok(Envelope::message(ORDER_PLACED))
}

/// List the caller's own orders.
#[instrument(skip_all)]
pub async fn list(State(state): State<AppState>, caller: CallerIdentity) -> Result<Envelope> {
    let orders = state.orders().list(OrderScope::Mine(caller.0)).await?;
    Ok(Envelope::orders(orders))
}

/// List every order (sellers only).
#[instrument(skip_all)]
pub async fn seller_orders(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Envelope> {
    let orders = state.orders().list(OrderScope::All(caller.0)).await?;
    Ok(Envelope::orders(orders))
}
