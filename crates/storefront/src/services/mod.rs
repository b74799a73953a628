//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `orders` - Order submission and dual-view order listing
//! - `users` - Caller profile lookup
//! - `user_sync` - Identity-provider user lifecycle mirroring

pub mod orders;
pub mod user_sync;
pub mod users;

pub use orders::{NewOrder, OrderError, OrderScope, OrderService};
pub use user_sync::{SkipReason, SyncError, SyncOutcome, SyncPolicy, UserSync};
pub use users::{UserError, UserService};
