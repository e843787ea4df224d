//! Dashboard API client

pub mod api;
pub mod dashboard;
#[cfg(test)]
pub mod mock;
pub mod models;

pub use api::{AdminApi, AuthApi, SecurityApi};
pub use dashboard::DashboardClient;
#[cfg(test)]
pub use mock::MockDashboardClient;

/// The full dashboard API surface
pub trait DashboardApi: AuthApi + AdminApi + SecurityApi {}

impl<T: AuthApi + AdminApi + SecurityApi> DashboardApi for T {}
