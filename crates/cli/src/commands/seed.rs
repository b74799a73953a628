//! Seed the catalogue and address book from JSON fixtures.
//!
//! Each file holds a JSON array of records in the same camelCase shape the
//! API returns. Records whose id already exists are skipped, so a fixture
//! can be loaded more than once.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use quickcart_storefront::db::{
    self, AddressRepository, PgStore, ProductRepository, RepositoryError,
};
use quickcart_storefront::models::{Address, Product};

use super::database_url;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Missing environment variable: QUICKCART_DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid fixture {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Counts reported after a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

impl SeedReport {
    /// Fold one insert result into the report. Conflicts count as skipped.
    fn record(&mut self, result: Result<(), RepositoryError>, id: &str) -> Result<(), SeedError> {
        match result {
            Ok(()) => self.inserted += 1,
            Err(RepositoryError::Conflict(reason)) => {
                warn!(id, %reason, "Record already exists, skipping");
                self.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

/// Parse a fixture file into records.
async fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SeedError> {
    let display = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: display.clone(),
            source,
        })?;
    parse(&content).map_err(|source| SeedError::Parse {
        path: display,
        source,
    })
}

fn parse<T: DeserializeOwned>(content: &str) -> Result<Vec<T>, serde_json::Error> {
    serde_json::from_str(content)
}

async fn connect() -> Result<PgStore, SeedError> {
    let database_url = database_url().ok_or(SeedError::MissingDatabaseUrl)?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");
    Ok(PgStore::new(pool))
}

/// Seed products from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or an insert fails
/// for a reason other than a duplicate id.
pub async fn products(path: &Path) -> Result<SeedReport, SeedError> {
    // Parse before connecting so a bad fixture fails fast.
    let products: Vec<Product> = load(path).await?;
    info!(count = products.len(), path = %path.display(), "Loaded products");

    let store = connect().await?;
    let mut report = SeedReport::default();
    for product in &products {
        report.record(
            ProductRepository::create(&store, product).await,
            product.id.as_str(),
        )?;
    }
    Ok(report)
}

/// Seed shipping addresses from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or an insert fails
/// for a reason other than a duplicate id.
pub async fn addresses(path: &Path) -> Result<SeedReport, SeedError> {
    let addresses: Vec<Address> = load(path).await?;
    info!(count = addresses.len(), path = %path.display(), "Loaded addresses");

    let store = connect().await?;
    let mut report = SeedReport::default();
    for address in &addresses {
        report.record(
            AddressRepository::create(&store, address).await,
            address.id.as_str(),
        )?;
    }
    Ok(report)
}
