//! Bus subscribers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use quickcart_core::OrderId;

use super::payloads::{IdentityUserPayload, OrderCreated};
use super::{BusBuilder, Event, EventHandler, HandlerError, names};
use crate::db::{OrderRepository, Repositories};
use crate::models::Order;
use crate::services::user_sync::{SyncPolicy, UserSync};

/// Subscribe every storefront handler.
#[must_use]
pub fn register(builder: BusBuilder, repositories: &Repositories, policy: SyncPolicy) -> BusBuilder {
    let orders = Arc::new(OrderCreatedHandler::new(Arc::clone(&repositories.orders)));
    let sync = UserSync::new(Arc::clone(&repositories.users), policy);

    builder
        .subscribe(names::ORDER_CREATED, orders)
        .subscribe(
            names::USER_CREATED,
            Arc::new(UserSyncHandler::new(sync.clone(), UserEventKind::Created)),
        )
        .subscribe(
            names::USER_UPDATED,
            Arc::new(UserSyncHandler::new(sync.clone(), UserEventKind::Updated)),
        )
        .subscribe(
            names::USER_DELETED,
            Arc::new(UserSyncHandler::new(sync, UserEventKind::Deleted)),
        )
}

/// Persists orders announced by `order.created`.
///
/// The order id is the event id, so a redelivery inserts nothing.
pub struct OrderCreatedHandler {
    orders: Arc<dyn OrderRepository>,
}

impl OrderCreatedHandler {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl EventHandler for OrderCreatedHandler {
    fn name(&self) -> &'static str {
        "order_created"
    }

    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let payload: OrderCreated = event.decode()?;
        let order = Order {
            id: OrderId::new(event.id.clone()),
            user_id: payload.user_id,
            address: payload.address,
            items: payload.items,
            amount: payload.amount,
            date: payload.date,
        };

        if self.orders.create(&order).await? {
            info!(order_id = %order.id, user_id = %order.user_id, "Order stored");
        } else {
            debug!(order_id = %order.id, "Order already stored");
        }
        Ok(())
    }
}

/// Lifecycle event a [`UserSyncHandler`] reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEventKind {
    Created,
    Updated,
    Deleted,
}

/// Applies one kind of `identity/user.*` event.
pub struct UserSyncHandler {
    sync: UserSync,
    kind: UserEventKind,
}

impl UserSyncHandler {
    #[must_use]
    pub const fn new(sync: UserSync, kind: UserEventKind) -> Self {
        Self { sync, kind }
    }
}

#[async_trait]
impl EventHandler for UserSyncHandler {
    fn name(&self) -> &'static str {
        match self.kind {
            UserEventKind::Created => "user_created",
            UserEventKind::Updated => "user_updated",
            UserEventKind::Deleted => "user_deleted",
        }
    }

    #[instrument(skip_all, fields(event_id = %event.id, kind = ?self.kind))]
    async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let payload = IdentityUserPayload::from_value(&event.data)?;

        let outcome = match self.kind {
            UserEventKind::Created => self.sync.on_created(&payload).await?,
            UserEventKind::Updated => self.sync.on_updated(&payload).await?,
            UserEventKind::Deleted => self.sync.on_deleted(&payload).await?,
        };

        info!(outcome = %outcome, "User sync");
        Ok(())
    }
}
