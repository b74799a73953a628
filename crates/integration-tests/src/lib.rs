//! Integration tests for QuickCart.
//!
//! # Running Tests
//!
//! ```bash
//! # In-process tests (memory store, no services needed)
//! cargo test -p quickcart-integration-tests
//!
//! # Including PostgreSQL-backed tests
//! QUICKCART_DATABASE_URL=postgres://... cargo test -p quickcart-integration-tests -- --ignored
//! ```
//!
//! # Harness
//!
//! [`TestContext`] builds the production router over a [`MemoryStore`], trusts
//! the `x-user-id` header for caller identity, and records published events
//! instead of queueing them. Tests call [`TestContext::deliver_events`] to run
//! the bus consumers at a point of their choosing, so every assertion is
//! deterministic.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use quickcart_core::{AddressId, Money, ProductId, UserId};
use quickcart_storefront::app;
use quickcart_storefront::db::{MemoryStore, Repositories};
use quickcart_storefront::events::testing::RecordingBus;
use quickcart_storefront::events::{BusBuilder, RetryPolicy, Subscriptions, handlers};
use quickcart_storefront::identity::webhook::{ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use quickcart_storefront::identity::{HeaderIdentity, SellerAllowList, WebhookVerifier};
use quickcart_storefront::models::{Address, Product, User};
use quickcart_storefront::services::SyncPolicy;
use quickcart_storefront::state::AppState;

/// Signing secret shared by the harness and its verifier.
pub const WEBHOOK_SECRET: &str = "whsec_cXVpY2tjYXJ0LXdlYmhvb2stdGVzdC1rZXk=";

/// Seller recognised by the harness.
pub const SELLER_ID: &str = "user_seller";

/// A response as seen by a client.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// In-process storefront with direct store access.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<RecordingBus>,
    router: Router,
    subscriptions: Subscriptions,
    verifier: WebhookVerifier,
    delivered: Mutex<usize>,
}

impl TestContext {
    /// Build a context with lenient user sync.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(SyncPolicy::Lenient)
    }

    /// Build a context with the given user sync policy.
    #[must_use]
    pub fn with_policy(policy: SyncPolicy) -> Self {
        Self::build(policy, Arc::new(RecordingBus::new()))
    }

    /// Build a context whose bus rejects every publish.
    #[must_use]
    pub fn with_closed_bus() -> Self {
        Self::build(SyncPolicy::Lenient, Arc::new(RecordingBus::closed()))
    }

    fn build(policy: SyncPolicy, bus: Arc<RecordingBus>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let repositories = Repositories::from_store(Arc::clone(&store));
        let retry = RetryPolicy {
            max_attempts: 1,
            base_delay: std::time::Duration::ZERO,
        };
        let subscriptions =
            handlers::register(BusBuilder::new(retry), &repositories, policy).into_subscriptions();

        let secret = SecretString::from(WEBHOOK_SECRET);
        let state = AppState::new(
            repositories,
            bus.clone(),
            Arc::new(HeaderIdentity::default()),
            Arc::new(SellerAllowList::new([UserId::new(SELLER_ID)])),
            WebhookVerifier::new(&secret).unwrap(),
        );

        Self {
            store,
            bus,
            router: app::router(state),
            subscriptions,
            verifier: WebhookVerifier::new(&secret).unwrap(),
            delivered: Mutex::new(0),
        }
    }

    /// Dispatch every event published since the last call.
    ///
    /// Returns the number of handler failures.
    pub async fn deliver_events(&self) -> usize {
        let events = self.bus.events();
        let start = {
            let mut delivered = self.delivered.lock().unwrap();
            std::mem::replace(&mut *delivered, events.len())
        };

        let mut failures = 0;
        for event in events.iter().skip(start) {
            failures += self.subscriptions.dispatch(event).await;
        }
        failures
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse { status, body }
    }

    /// GET `uri`, optionally as `caller`.
    pub async fn get(&self, uri: &str, caller: Option<&str>) -> TestResponse {
        let mut builder = Request::get(uri);
        if let Some(caller) = caller {
            builder = builder.header("x-user-id", caller);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// POST a JSON body to `uri`, optionally as `caller`.
    pub async fn post_json(&self, uri: &str, caller: Option<&str>, body: &Value) -> TestResponse {
        self.post_raw(uri, caller, body.to_string()).await
    }

    /// POST raw bytes labelled as JSON.
    pub async fn post_raw(&self, uri: &str, caller: Option<&str>, body: String) -> TestResponse {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(caller) = caller {
            builder = builder.header("x-user-id", caller);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// POST a correctly signed identity webhook.
    pub async fn post_webhook(&self, delivery_id: &str, body: &Value) -> TestResponse {
        let body = body.to_string();
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.verifier.sign(delivery_id, timestamp, body.as_bytes());

        let request = Request::post("/api/webhooks/identity")
            .header("content-type", "application/json")
            .header(ID_HEADER, delivery_id)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Store a product priced at `offer_minor` hundredths.
    pub async fn seed_product(&self, id: &str, offer_minor: i64) -> Product {
        let product = product(id, offer_minor);
        self.store.put_product(product.clone()).await;
        product
    }

    /// Store an address owned by `user_id`.
    pub async fn seed_address(&self, id: &str, user_id: &str) -> Address {
        let address = address(id, user_id);
        self.store.put_address(address.clone()).await;
        address
    }

    /// Store a user with `cart` contents.
    pub async fn seed_user(&self, id: &str, cart: &[(&str, u32)]) -> User {
        let user = User {
            id: UserId::new(id),
            email: format!("{id}@example.com"),
            name: "Test User".to_owned(),
            image_url: String::new(),
            cart_items: cart
                .iter()
                .map(|(product, quantity)| (ProductId::new(*product), *quantity))
                .collect(),
        };
        self.store.put_user(user.clone()).await;
        user
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A product fixture.
#[must_use]
pub fn product(id: &str, offer_minor: i64) -> Product {
    Product {
        id: ProductId::new(id),
        user_id: UserId::new(SELLER_ID),
        name: format!("Product {id}"),
        description: String::new(),
        category: "Earphone".to_owned(),
        price: Money::from_minor(offer_minor + 1_000),
        offer_price: Money::from_minor(offer_minor),
        images: vec![format!("https://cdn.example.com/{id}.png")],
        date: 1_700_000_000_000,
    }
}

/// An address fixture.
#[must_use]
pub fn address(id: &str, user_id: &str) -> Address {
    Address {
        id: AddressId::new(id),
        user_id: UserId::new(user_id),
        full_name: "Test User".to_owned(),
        phone_number: "0123456789".to_owned(),
        pincode: "560001".to_owned(),
        area: "Main Street 1".to_owned(),
        city: "Bengaluru".to_owned(),
        state: "Karnataka".to_owned(),
    }
}
