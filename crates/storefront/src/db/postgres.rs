//! `PostgreSQL`-backed store.
//!
//! The repository implementations for each collection live next to their
//! trait (`users.rs`, `products.rs`, ...); this module only holds the shared
//! pool handle. Queries are plain `sqlx::query_as` with runtime binding so the
//! crate builds without a live database.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{RepositoryError, StoreHealth};

/// Store backed by the `quickcart` schema in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Convert a `COUNT(*)` result to `u64`.
pub(crate) fn count_from_i64(count: i64) -> Result<u64, RepositoryError> {
    u64::try_from(count)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative row count: {count}")))
}
