//! Persistence gateway for the storefront.
//!
//! # Collections
//!
//! - `users` - Mirrored identity-provider users and their carts
//! - `products` - Seller catalogue
//! - `addresses` - Shipping addresses
//! - `orders` - Placed orders (written by the `order.created` consumer)
//!
//! Each collection is accessed through a repository trait so handlers can run
//! against [`PgStore`] in production and [`MemoryStore`] in tests or local
//! development. Every operation is a single-row read or write; there are no
//! multi-collection transactions.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p quickcart-cli -- migrate
//! ```

pub mod addresses;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod products;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use memory::MemoryStore;
pub use orders::{OrderFilter, OrderRepository};
pub use postgres::PgStore;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., duplicate primary key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Round-trip to the store.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Handles to every collection, shared by handlers and event consumers.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// Use a single store for every collection.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + ProductRepository
            + AddressRepository
            + OrderRepository
            + StoreHealth
            + 'static,
    {
        Self {
            users: store.clone(),
            products: store.clone(),
            addresses: store.clone(),
            orders: store.clone(),
            health: store,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a unique-key violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
