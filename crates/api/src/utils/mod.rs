//! Helpers shared by the route handlers and the binary.

pub mod health;
pub mod logging;
