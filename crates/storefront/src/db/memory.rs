//! In-process store.
//!
//! Used for local development (`QUICKCART_STORE=memory`) and as the store in
//! tests. Each collection sits behind its own lock, so every operation is
//! atomic for a single record, matching what the `PostgreSQL` store offers.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use quickcart_core::{AddressId, OrderId, ProductId, UserId};

use super::{
    AddressRepository, OrderFilter, OrderRepository, ProductRepository, RepositoryError,
    StoreHealth, UserRepository,
};
use crate::models::{Address, CartItems, Order, Product, User, UserPatch};

/// Store that keeps every collection in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    products: RwLock<HashMap<ProductId, Product>>,
    addresses: RwLock<HashMap<AddressId, Address>>,
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product, bypassing conflict checks.
    pub async fn put_product(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    /// Insert or replace an address, bypassing conflict checks.
    pub async fn put_address(&self, address: Address) {
        self.addresses
            .write()
            .await
            .insert(address.id.clone(), address);
    }

    /// Insert or replace a user, bypassing conflict checks.
    pub async fn put_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Insert or replace an order, bypassing conflict checks.
    pub async fn put_order(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict("user already exists".to_owned()));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: &UserId,
        patch: &UserPatch,
    ) -> Result<Option<User>, RepositoryError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(id).map(|user| {
            patch.apply(user);
            user.clone()
        }))
    }

    async fn set_cart_items(&self, id: &UserId, cart: &CartItems) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        Ok(users
            .get_mut(id)
            .map(|user| user.cart_items.clone_from(cart))
            .is_some())
    }

    async fn delete(&self, id: &UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.write().await.remove(id).is_some())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.users.read().await.len() as u64)
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn get_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn create(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        if products.contains_key(&product.id) {
            return Err(RepositoryError::Conflict(
                "product already exists".to_owned(),
            ));
        }
        products.insert(product.id.clone(), product.clone());
        Ok(())
    }
}

#[async_trait]
impl AddressRepository for MemoryStore {
    async fn get_by_id(&self, id: &AddressId) -> Result<Option<Address>, RepositoryError> {
        Ok(self.addresses.read().await.get(id).cloned())
    }

    async fn create(&self, address: &Address) -> Result<(), RepositoryError> {
        let mut addresses = self.addresses.write().await;
        if addresses.contains_key(&address.id) {
            return Err(RepositoryError::Conflict(
                "address already exists".to_owned(),
            ));
        }
        addresses.insert(address.id.clone(), address.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn create(&self, order: &Order) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Ok(false);
        }
        orders.insert(order.id.clone(), order.clone());
        Ok(true)
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        orders.sort_by_key(|order| Reverse(order.date));
        Ok(orders)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
