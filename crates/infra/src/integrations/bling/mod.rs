//! Bling ERP integration
//!
//! - [`BlingClient`]: bearer-authenticated JSON calls against API v3
//! - [`BlingTokenRefresher`]: OAuth refresh-token grant
//! - [`errors`]: status, rate-limit and OAuth failure classification

pub mod auth;
pub mod client;
pub mod errors;

pub use auth::BlingTokenRefresher;
pub use client::BlingClient;
