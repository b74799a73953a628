//! Domain models for the storefront.
//!
//! These are the four record types held by the store. References between
//! them (`Order.address`, `Order.items[].product`) are plain ids with no
//! referential integrity; see [`order::OrderDetail`] for the resolved view.

pub mod address;
pub mod order;
pub mod product;
pub mod user;

pub use address::Address;
pub use order::{Order, OrderDetail, OrderItem, OrderItemDetail};
pub use product::Product;
pub use user::{CartItems, User, UserPatch};
