//! `QuickCart` storefront library.
//!
//! Order submission, dual-view order listing, user profiles and
//! identity-provider user sync, served over axum. The binary in `main.rs`
//! only wires configuration to [`app`]; everything else lives here so the
//! integration tests can build the same router against in-process doubles.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
