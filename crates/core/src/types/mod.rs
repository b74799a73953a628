//! Core types for QuickCart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod pricing;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use pricing::{OrderTotal, SURCHARGE_PERCENT};
