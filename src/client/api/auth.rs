//! Authentication API trait

use async_trait::async_trait;

use super::ApiResult;
use crate::challenge::Credential;
use crate::client::models::LoginResponse;

/// Authentication operations for the dashboard API
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Sign in. The first attempt carries a password, a step-up retry the
    /// second factor.
    async fn login(&self, username: &str, credential: Credential) -> ApiResult<LoginResponse>;
}
