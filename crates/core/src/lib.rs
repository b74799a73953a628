//! QuickCart Core - Shared domain types.
//!
//! This crate provides the types shared by the QuickCart components:
//! - `storefront` - HTTP handlers and event-sync glue
//! - `cli` - Migrations and catalogue seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Order pricing lives here so that every consumer
//! computes totals the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, money, email, and order pricing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
