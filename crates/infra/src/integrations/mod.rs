//! External service integrations

pub mod bling;
