//! OAuth token lifecycle

pub mod ports;
pub mod token_lifecycle;

pub use ports::CredentialStore;
pub use token_lifecycle::{RenewalOutcome, TokenLifecycleConfig, TokenLifecycleManager};
