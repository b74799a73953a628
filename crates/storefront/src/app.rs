//! Application assembly: router layers and wiring from configuration.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderName;
use tower_http::trace::TraceLayer;

use quickcart_core::UserId;

use crate::config::{IdentityMode, StoreConfig, StorefrontConfig};
use crate::db::{self, MemoryStore, PgStore, Repositories};
use crate::identity::{
    HeaderIdentity, IdentityApiSellerOracle, IdentityGateway, JwtIdentity, SellerAllowList,
    SellerOracle, WebhookVerifier,
};
use crate::middleware::{make_request_span, request_id_middleware};
use crate::routes;
use crate::state::AppState;

/// Errors that abort startup wiring.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid identity key: {0}")]
    IdentityKey(#[from] jsonwebtoken::errors::Error),
    #[error("invalid identity header name: {0}")]
    IdentityHeader(#[from] axum::http::header::InvalidHeaderName),
    #[error("invalid webhook secret: {0}")]
    WebhookSecret(#[from] crate::identity::WebhookError),
    #[error("identity API client: {0}")]
    IdentityApi(#[from] crate::identity::seller::IdentityApiError),
}

/// Build the full router with tracing and request-id layers.
pub fn router(state: AppState) -> Router {
    routes::routes()
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
}

/// Open the configured store.
///
/// # Errors
///
/// Returns an error if the `PostgreSQL` pool cannot connect.
pub async fn open_store(config: &StoreConfig) -> Result<Repositories, StartupError> {
    match config {
        StoreConfig::Postgres { database_url } => {
            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");
            Ok(Repositories::from_store(Arc::new(PgStore::new(pool))))
        }
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Repositories::from_store(Arc::new(MemoryStore::new())))
        }
    }
}

/// Build the caller identity gateway.
///
/// # Errors
///
/// Returns an error if the public key or header name is invalid.
pub fn identity_gateway(
    config: &StorefrontConfig,
) -> Result<Arc<dyn IdentityGateway>, StartupError> {
    let issuer = config.identity.issuer.as_deref();
    Ok(match &config.identity.mode {
        IdentityMode::JwtPublicKey(pem) => Arc::new(JwtIdentity::from_rsa_pem(pem, issuer)?),
        IdentityMode::JwtSecret(secret) => Arc::new(JwtIdentity::from_secret(secret, issuer)),
        IdentityMode::Header(name) => {
            tracing::warn!(header = %name, "Trusting caller identity header");
            Arc::new(HeaderIdentity::new(HeaderName::try_from(name.as_str())?))
        }
    })
}

/// Build the seller capability check.
///
/// # Errors
///
/// Returns an error if the identity API client cannot be built.
pub fn seller_oracle(config: &StorefrontConfig) -> Result<Arc<dyn SellerOracle>, StartupError> {
    let allow_list = SellerAllowList::new(
        config
            .identity
            .seller_ids
            .iter()
            .map(|id| UserId::new(id.as_str())),
    );

    match (&config.identity.api_url, &config.identity.api_secret) {
        (Some(url), Some(secret)) => Ok(Arc::new(IdentityApiSellerOracle::new(
            url.clone(),
            secret,
            allow_list,
        )?)),
        _ => {
            if allow_list.is_empty() {
                tracing::warn!("No seller source configured; seller views are disabled");
            }
            Ok(Arc::new(allow_list))
        }
    }
}

/// Build the webhook verifier.
///
/// # Errors
///
/// Returns an error if the secret is not valid base64.
pub fn webhook_verifier(config: &StorefrontConfig) -> Result<WebhookVerifier, StartupError> {
    Ok(WebhookVerifier::new(&config.identity.webhook_secret)?)
}
