//! Staff administration API trait

use async_trait::async_trait;

use super::ApiResult;
use crate::challenge::Credential;
use crate::client::models::{KillSwitch, LogLevel};

/// Staff-only operations
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Turn a named kill switch on or off
    async fn set_kill_switch(
        &self,
        name: &str,
        enabled: bool,
        credential: Credential,
    ) -> ApiResult<KillSwitch>;

    /// Change the server log level
    async fn set_log_level(&self, level: &str, credential: Credential) -> ApiResult<LogLevel>;
}
