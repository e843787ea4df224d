//! API trait definitions split by responsibility
//!
//! This module organizes the dashboard API surface into focused sub-traits:
//! - [`AuthApi`] - Sign-in
//! - [`AdminApi`] - Staff-only switches
//! - [`SecurityApi`] - Second-factor enrollment
//!
//! Every privileged call takes a [`Credential`](crate::challenge::Credential)
//! so it can be retried with a second factor.

mod admin;
mod auth;
mod security;

pub use admin::AdminApi;
pub use auth::AuthApi;
pub use security::SecurityApi;

/// Result of a single API call
pub type ApiResult<T> = std::result::Result<T, crate::error::ApiError>;
