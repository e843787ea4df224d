//! Dashboard API data models
//!
//! Models are organized by resource type for easy discovery.

mod admin;
mod auth;
mod security;

pub use admin::{KillSwitch, LogLevel};
pub use auth::LoginResponse;
pub use security::SecondFactor;
#[cfg(test)]
pub use security::FactorKind;
