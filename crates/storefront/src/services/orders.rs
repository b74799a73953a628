//! Order submission and listing.
//!
//! Submission prices the cart, hands the order to the bus as an
//! `order.created` event and clears the caller's cart. The order itself is
//! persisted by the event consumer, never here.
//!
//! Listing resolves each order's address and products by id. References are
//! not enforced by the store, so a reference that no longer resolves (or a
//! lookup that fails) becomes `None` instead of failing the request.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use quickcart_core::{AddressId, OrderTotal, ProductId, UserId};

use crate::db::{OrderFilter, Repositories, RepositoryError};
use crate::events::payloads::OrderCreated;
use crate::events::{Event, EventBus, PublishError, names};
use crate::identity::SellerOracle;
use crate::models::{CartItems, Order, OrderDetail, OrderItem, OrderItemDetail};

/// Confirmation returned by a successful submission.
pub const ORDER_PLACED: &str = "Order placed successfully";

/// Errors returned by [`OrderService`].
#[derive(Debug, Error)]
pub enum OrderError {
    /// No caller identity on the request.
    #[error("User not authenticated")]
    Unauthenticated,

    /// The caller may not see every order.
    #[error("Unauthorized")]
    Unauthorized,

    /// Missing address, empty items, or a zero quantity.
    #[error("Invalid address or items")]
    InvalidInput,

    /// An item references a product that does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The `order.created` event could not be published.
    #[error("failed to publish order: {0}")]
    EventPublish(#[from] PublishError),

    /// A store operation failed.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// A submitted cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewOrder {
    pub address: Option<AddressId>,
    pub items: Vec<OrderItem>,
}

/// Which orders a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderScope {
    /// The caller's own orders.
    Mine(Option<UserId>),
    /// Every order; sellers only.
    All(Option<UserId>),
}

/// Order submission and listing.
#[derive(Clone)]
pub struct OrderService {
    repositories: Repositories,
    bus: Arc<dyn EventBus>,
    sellers: Arc<dyn SellerOracle>,
}

impl OrderService {
    /// Create an order service.
    #[must_use]
    pub fn new(
        repositories: Repositories,
        bus: Arc<dyn EventBus>,
        sellers: Arc<dyn SellerOracle>,
    ) -> Self {
        Self {
            repositories,
            bus,
            sellers,
        }
    }

    /// Price an order, publish `order.created`, and clear the caller's cart.
    ///
    /// Products are looked up one at a time in item order, so the first
    /// missing product is the one reported.
    ///
    /// # Errors
    ///
    /// - `OrderError::Unauthenticated` without a caller
    /// - `OrderError::InvalidInput` for a missing address, no items, or a zero
    ///   quantity
    /// - `OrderError::ProductNotFound` for the first unknown product; nothing
    ///   is published
    /// - `OrderError::EventPublish` if the bus rejects the event; the cart is
    ///   left as is
    /// - `OrderError::Storage` if a lookup or the cart update fails
    #[instrument(skip(self, order), fields(item_count = order.items.len()))]
    pub async fn submit(
        &self,
        caller: Option<&UserId>,
        order: NewOrder,
    ) -> Result<OrderTotal, OrderError> {
        let caller = caller.ok_or(OrderError::Unauthenticated)?;

        let address = order
            .address
            .filter(|address| !address.is_blank())
            .ok_or(OrderError::InvalidInput)?;
        if order.items.is_empty() || order.items.iter().any(|item| item.quantity == 0) {
            return Err(OrderError::InvalidInput);
        }

        let mut lines = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product = self
                .repositories
                .products
                .get_by_id(&item.product)
                .await?
                .ok_or_else(|| OrderError::ProductNotFound(item.product.clone()))?;
            lines.push((product.offer_price, item.quantity));
        }
        let total = OrderTotal::from_lines(lines);

        let event = Event::encode(
            names::ORDER_CREATED,
            &OrderCreated {
                user_id: caller.clone(),
                address: Some(address),
                items: order.items,
                amount: total.total,
                date: chrono::Utc::now().timestamp_millis(),
            },
        )
        .map_err(PublishError::from)?;
        let event_id = event.id.clone();
        self.bus.publish(event).await?;

        if self.repositories.users.get_by_id(caller).await?.is_some() {
            self.repositories
                .users
                .set_cart_items(caller, &CartItems::new())
                .await?;
        } else {
            debug!("No user record for caller, cart not cleared");
        }

        info!(event_id = %event_id, amount = %total.total, "Order submitted");
        Ok(total)
    }

    /// List orders newest first, with addresses and products resolved.
    ///
    /// # Errors
    ///
    /// - `OrderError::Unauthenticated` without a caller
    /// - `OrderError::Unauthorized` for [`OrderScope::All`] when the caller is
    ///   not a seller
    /// - `OrderError::Storage` if the order query fails
    #[instrument(skip(self))]
    pub async fn list(&self, scope: OrderScope) -> Result<Vec<OrderDetail>, OrderError> {
        let filter = match scope {
            OrderScope::Mine(caller) => {
                OrderFilter::for_user(caller.ok_or(OrderError::Unauthenticated)?)
            }
            OrderScope::All(caller) => {
                let caller = caller.ok_or(OrderError::Unauthenticated)?;
                if !self.sellers.is_seller(&caller).await {
                    return Err(OrderError::Unauthorized);
                }
                OrderFilter::all()
            }
        };

        let orders = self.repositories.orders.list(&filter).await?;
        debug!(order_count = orders.len(), "Resolving order references");

        Ok(resolve_orders(&self.repositories, orders).await)
    }
}

/// Resolve every order's address and products concurrently.
///
/// Each lookup fills only its own slot; a failed or dangling lookup yields
/// `None` without affecting the others.
pub async fn resolve_orders(repositories: &Repositories, orders: Vec<Order>) -> Vec<OrderDetail> {
    join_all(
        orders
            .into_iter()
            .map(|order| resolve_order(repositories, order)),
    )
    .await
}

async fn resolve_order(repositories: &Repositories, order: Order) -> OrderDetail {
    let address = async {
        match order.address.as_ref().filter(|id| !id.is_blank()) {
            Some(id) => lookup("address", id.as_str(), repositories.addresses.get_by_id(id)).await,
            None => None,
        }
    };

    let items = join_all(order.items.iter().map(|item| async {
        OrderItemDetail {
            product: lookup(
                "product",
                item.product.as_str(),
                repositories.products.get_by_id(&item.product),
            )
            .await,
            quantity: item.quantity,
        }
    }));

    let (address, items) = futures::join!(address, items);

    OrderDetail {
        id: order.id,
        user_id: order.user_id,
        address,
        items,
        amount: order.amount,
        date: order.date,
    }
}

async fn lookup<T>(
    kind: &'static str,
    id: &str,
    fut: impl Future<Output = Result<Option<T>, RepositoryError>>,
) -> Option<T> {
    match fut.await {
        Ok(found) => {
            if found.is_none() {
                debug!(kind, id, "Dangling reference");
            }
            found
        }
        Err(e) => {
            warn!(kind, id, error = %e, "Reference lookup failed");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use quickcart_core::{Money, OrderId};

    use super::*;
    use crate::db::{MemoryStore, OrderRepository, ProductRepository, UserRepository};
    use crate::events::testing::RecordingBus;
    use crate::identity::SellerAllowList;
    use crate::models::{Address, Product, User};

    struct Fixture {
        store: Arc<MemoryStore>,
        bus: Arc<RecordingBus>,
        service: OrderService,
    }

    fn fixture_with(repositories: Option<Repositories>, bus: RecordingBus) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(bus);
        let repositories = repositories.unwrap_or_else(|| Repositories::from_store(store.clone()));
        let sellers = Arc::new(SellerAllowList::new([UserId::new("seller")]));
        Fixture {
            service: OrderService::new(repositories, bus.clone(), sellers),
            store,
            bus,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None, RecordingBus::new())
    }

    fn product(id: &str, offer_minor: i64) -> Product {
        Product {
            id: ProductId::new(id),
            user_id: UserId::new("seller"),
            name: id.to_string(),
            description: String::new(),
            category: "Gadgets".to_string(),
            price: Money::from_minor(offer_minor * 2),
            offer_price: Money::from_minor(offer_minor),
            images: Vec::new(),
            date: 0,
        }
    }

    fn address(id: &str) -> Address {
        Address {
            id: AddressId::new(id),
            user_id: UserId::new("alice"),
            full_name: "Alice".to_string(),
            phone_number: "555-0100".to_string(),
            pincode: "10001".to_string(),
            area: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
        }
    }

    fn item(product: &str, quantity: u32) -> OrderItem {
        OrderItem {
            product: ProductId::new(product),
            quantity,
        }
    }

    fn cart(items: Vec<OrderItem>) -> NewOrder {
        NewOrder {
            address: Some(AddressId::new("addr_1")),
            items,
        }
    }

    fn stored_order(id: &str, user: &str, date: i64, address: Option<&str>) -> Order {
        Order {
            id: OrderId::new(id),
            user_id: UserId::new(user),
            address: address.map(AddressId::new),
            items: vec![item("prod_a", 1)],
            amount: Money::from_minor(1_020),
            date,
        }
    }

    fn alice() -> UserId {
        UserId::new("alice")
    }

    #[tokio::test]
    async fn test_submit_prices_with_surcharge_and_publishes() {
        let f = fixture();
        f.store.put_product(product("prod_a", 2_500)).await;
        f.store.put_product(product("prod_b", 5_000)).await;

        let total = f
            .service
            .submit(Some(&alice()), cart(vec![item("prod_a", 2), item("prod_b", 1)]))
            .await
            .unwrap();

        assert_eq!(total.subtotal, Money::from_minor(10_000));
        assert_eq!(total.total, Money::from_minor(10_200));

        let events = f.bus.events();
        assert_eq!(events.len(), 1);
        let event = events.first().unwrap();
        assert_eq!(event.name, names::ORDER_CREATED);
        let payload: OrderCreated = event.decode().unwrap();
        assert_eq!(payload.user_id, alice());
        assert_eq!(payload.address, Some(AddressId::new("addr_1")));
        assert_eq!(payload.amount, Money::from_minor(10_200));
        assert_eq!(payload.items.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_requires_caller() {
        let f = fixture();
        let err = f
            .service
            .submit(None, cart(vec![item("prod_a", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_input() {
        let f = fixture();
        f.store.put_product(product("prod_a", 100)).await;

        for order in [
            NewOrder {
                address: None,
                items: vec![item("prod_a", 1)],
            },
            NewOrder {
                address: Some(AddressId::new("  ")),
                items: vec![item("prod_a", 1)],
            },
            cart(Vec::new()),
            cart(vec![item("prod_a", 0)]),
        ] {
            let err = f.service.submit(Some(&alice()), order).await.unwrap_err();
            assert!(matches!(err, OrderError::InvalidInput));
        }
        assert!(f.bus.events().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_publishes_nothing() {
        let f = fixture();
        f.store.put_product(product("prod_a", 100)).await;

        let err = f
            .service
            .submit(
                Some(&alice()),
                cart(vec![item("prod_a", 1), item("ghost_1", 1), item("ghost_2", 1)]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::ProductNotFound(id) if id.as_str() == "ghost_1"));
        assert!(f.bus.events().is_empty());
    }

    #[tokio::test]
    async fn test_submit_clears_existing_cart() {
        let f = fixture();
        f.store.put_product(product("prod_a", 100)).await;
        let mut user = User {
            id: alice(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            image_url: String::new(),
            cart_items: CartItems::new(),
        };
        user.cart_items.insert(ProductId::new("prod_a"), 3);
        f.store.put_user(user).await;

        f.service
            .submit(Some(&alice()), cart(vec![item("prod_a", 3)]))
            .await
            .unwrap();

        let user = UserRepository::get_by_id(f.store.as_ref(), &alice())
            .await
            .unwrap()
            .unwrap();
        assert!(user.cart_items.is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_user_record_succeeds() {
        let f = fixture();
        f.store.put_product(product("prod_a", 100)).await;

        f.service
            .submit(Some(&alice()), cart(vec![item("prod_a", 1)]))
            .await
            .unwrap();

        assert_eq!(f.bus.events().len(), 1);
        assert_eq!(UserRepository::count(f.store.as_ref()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_cart() {
        let f = fixture_with(None, RecordingBus::closed());
        f.store.put_product(product("prod_a", 100)).await;
        let mut user = User {
            id: alice(),
            email: String::new(),
            name: "Alice".to_string(),
            image_url: String::new(),
            cart_items: CartItems::new(),
        };
        user.cart_items.insert(ProductId::new("prod_a"), 1);
        f.store.put_user(user).await;

        let err = f
            .service
            .submit(Some(&alice()), cart(vec![item("prod_a", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::EventPublish(PublishError::Closed)));
        let user = UserRepository::get_by_id(f.store.as_ref(), &alice())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.cart_items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_mine_only_returns_callers_orders() {
        let f = fixture();
        f.store.put_order(stored_order("o1", "alice", 100, None)).await;
        f.store.put_order(stored_order("o2", "bob", 200, None)).await;
        f.store.put_order(stored_order("o3", "alice", 300, None)).await;

        let orders = f.service.list(OrderScope::Mine(Some(alice()))).await.unwrap();

        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o3", "o1"]);
        assert!(orders.iter().all(|o| o.user_id == alice()));
    }

    #[tokio::test]
    async fn test_list_requires_caller() {
        let f = fixture();
        assert!(matches!(
            f.service.list(OrderScope::Mine(None)).await.unwrap_err(),
            OrderError::Unauthenticated
        ));
        assert!(matches!(
            f.service.list(OrderScope::All(None)).await.unwrap_err(),
            OrderError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_list_all_requires_seller() {
        let f = fixture();
        f.store.put_order(stored_order("o1", "alice", 100, None)).await;
        f.store.put_order(stored_order("o2", "bob", 200, None)).await;

        let err = f
            .service
            .list(OrderScope::All(Some(alice())))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Unauthorized));

        let orders = f
            .service
            .list(OrderScope::All(Some(UserId::new("seller"))))
            .await
            .unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[tokio::test]
    async fn test_dangling_references_resolve_to_none() {
        let f = fixture();
        f.store.put_address(address("addr_1")).await;
        f.store.put_product(product("prod_a", 1_000)).await;
        f.store
            .put_order(stored_order("o1", "alice", 100, Some("addr_1")))
            .await;
        f.store
            .put_order(stored_order("o2", "alice", 200, Some("addr_gone")))
            .await;
        let mut orphan = stored_order("o3", "alice", 300, None);
        orphan.items.push(item("prod_gone", 4));
        f.store.put_order(orphan).await;

        let orders = f.service.list(OrderScope::Mine(Some(alice()))).await.unwrap();
        assert_eq!(orders.len(), 3);

        let by_id = |id: &str| orders.iter().find(|o| o.id.as_str() == id).unwrap();
        assert_eq!(by_id("o1").address.as_ref().unwrap().city, "Springfield");
        assert!(by_id("o2").address.is_none());
        assert!(by_id("o3").address.is_none());

        let o3 = by_id("o3");
        assert_eq!(o3.items.len(), 2);
        assert!(o3.items.first().unwrap().product.is_some());
        let gone = o3.items.get(1).unwrap();
        assert!(gone.product.is_none());
        assert_eq!(gone.quantity, 4);
    }

    /// Product lookups always fail; everything else uses the memory store.
    struct BrokenProducts;

    #[async_trait]
    impl ProductRepository for BrokenProducts {
        async fn get_by_id(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::DataCorruption("bad row".to_string()))
        }

        async fn create(&self, _product: &Product) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_errors_resolve_to_none() {
        let store = Arc::new(MemoryStore::new());
        store.put_address(address("addr_1")).await;
        store
            .put_order(stored_order("o1", "alice", 100, Some("addr_1")))
            .await;
        let mut repositories = Repositories::from_store(store.clone());
        repositories.products = Arc::new(BrokenProducts);

        let orders = resolve_orders(
            &repositories,
            OrderRepository::list(store.as_ref(), &OrderFilter::all())
                .await
                .unwrap(),
        )
        .await;

        let order = orders.first().unwrap();
        assert!(order.address.is_some());
        assert!(order.items.first().unwrap().product.is_none());
    }
}
