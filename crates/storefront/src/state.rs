//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::Repositories;
use crate::events::EventBus;
use crate::identity::{IdentityGateway, SellerOracle, WebhookVerifier};
use crate::services::{OrderService, UserService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, the event bus and the identity integration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    repositories: Repositories,
    bus: Arc<dyn EventBus>,
    identity: Arc<dyn IdentityGateway>,
    webhooks: WebhookVerifier,
    orders: OrderService,
    users: UserService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `repositories` - Store handles
    /// * `bus` - Where `order.created` and webhook events are published
    /// * `identity` - Resolves the caller of a request
    /// * `sellers` - Seller capability check for the all-orders view
    /// * `webhooks` - Identity webhook signature verifier
    #[must_use]
    pub fn new(
        repositories: Repositories,
        bus: Arc<dyn EventBus>,
        identity: Arc<dyn IdentityGateway>,
        sellers: Arc<dyn SellerOracle>,
        webhooks: WebhookVerifier,
    ) -> Self {
        let orders = OrderService::new(repositories.clone(), Arc::clone(&bus), sellers);
        let users = UserService::new(Arc::clone(&repositories.users));

        Self {
            inner: Arc::new(AppStateInner {
                repositories,
                bus,
                identity,
                webhooks,
                orders,
                users,
            }),
        }
    }

    /// Get the store handles.
    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.inner.repositories
    }

    /// Get the event bus.
    #[must_use]
    pub fn bus(&self) -> &dyn EventBus {
        self.inner.bus.as_ref()
    }

    /// Get the caller identity gateway.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityGateway {
        self.inner.identity.as_ref()
    }

    /// Get the webhook verifier.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookVerifier {
        &self.inner.webhooks
    }

    /// Get the order service.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get the user profile service.
    #[must_use]
    pub fn users(&self) -> &UserService {
        &self.inner.users
    }
}
