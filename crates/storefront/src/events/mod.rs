//! Event bus.
//!
//! Handlers publish named events (`order.created`) and react to events coming
//! from the identity provider (`identity/user.*`). Delivery is at-least-once:
//! a handler that returns an error is retried by the bus, so every handler in
//! [`handlers`] is idempotent.
//!
//! # Events
//!
//! | Name | Publisher | Consumer |
//! |------|-----------|----------|
//! | `order.created` | order submission | [`handlers::OrderCreatedHandler`] |
//! | `identity/user.created` | identity webhook | [`handlers::UserSyncHandler`] |
//! | `identity/user.updated` | identity webhook | [`handlers::UserSyncHandler`] |
//! | `identity/user.deleted` | identity webhook | [`handlers::UserSyncHandler`] |

pub mod bus;
pub mod handlers;
pub mod payloads;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::RepositoryError;
use crate::services::user_sync::SyncError;

pub use bus::{BusBuilder, BusWorker, InProcessBus, RetryPolicy, Subscriptions};

/// Event names used on the bus.
pub mod names {
    /// An order was submitted and priced.
    pub const ORDER_CREATED: &str = "order.created";

    /// A user signed up with the identity provider.
    pub const USER_CREATED: &str = "identity/user.created";

    /// A user's profile changed at the identity provider.
    pub const USER_UPDATED: &str = "identity/user.updated";

    /// A user was deleted at the identity provider.
    pub const USER_DELETED: &str = "identity/user.deleted";
}

/// An event on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id; redeliveries of the same event share it.
    pub id: String,
    /// Event name, see [`names`].
    pub name: String,
    /// JSON payload.
    pub data: serde_json::Value,
    /// Publication time, epoch milliseconds.
    pub timestamp: i64,
}

impl Event {
    /// Create an event with a fresh id.
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an event with a JSON-serialized payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode<T: Serialize>(
        name: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(name, serde_json::to_value(payload)?))
    }

    /// Replace the generated id, e.g. with an upstream delivery id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Decode the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Errors returned when publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus is shut down and no longer accepts events.
    #[error("event bus is closed")]
    Closed,

    /// The payload could not be serialized.
    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by event handlers. Any error makes the bus redeliver.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event payload did not match the expected shape.
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A store operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// User synchronization failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Something events can be published to.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event. Returns once the bus has accepted it; handlers run
    /// afterwards.
    async fn publish(&self, event: Event) -> Result<(), PublishError>;
}

/// A subscriber to one or more event names.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handle one delivery. Returning an error requests redelivery.
    async fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}
