//! Second-factor enrollment API trait

use async_trait::async_trait;

use super::ApiResult;
use crate::challenge::Credential;
use crate::client::models::SecondFactor;

/// Operations on the signed-in user's second factors
#[async_trait]
pub trait SecurityApi: Send + Sync {
    /// List enrolled factors
    async fn list_second_factors(&self) -> ApiResult<Vec<SecondFactor>>;

    /// Remove the authenticator app
    async fn delete_totp(&self, credential: Credential) -> ApiResult<()>;

    /// Remove one security key
    async fn delete_webauthn(&self, id: &str, credential: Credential) -> ApiResult<()>;
}
