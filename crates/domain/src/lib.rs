//! # StockSync Domain
//!
//! Business domain types for the ERP integration subsystem.
//!
//! This crate contains:
//! - Sync run history, queue and lock types
//! - Webhook event records and the vendor envelope
//! - OAuth credential state
//! - Catalog entities mirrored from the ERP, plus their wire shapes
//! - Error taxonomy, configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other StockSync crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
