//! Mock dashboard API client for testing
//!
//! Provides a mock implementation of the API traits so step-up flows can be
//! exercised without making real API calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::api::{AdminApi, ApiResult, AuthApi, SecurityApi};
use super::models::{KillSwitch, LogLevel, LoginResponse, SecondFactor};
use crate::challenge::Credential;
use crate::config::UserSnapshot;
use crate::error::ApiError;

/// Mock API client for testing.
///
/// Configure expected responses via builder methods, then use in tests.
///
/// # Example
/// ```ignore
/// let mock = MockDashboardClient::new()
///     .with_error(ApiError::InsufficientPermissions)
///     .await;
///
/// let err = mock.delete_totp(Credential::None).await.unwrap_err();
/// ```
#[derive(Default, Clone)]
pub struct MockDashboardClient {
    /// Errors returned by the next calls, in order
    errors: Arc<Mutex<VecDeque<ApiError>>>,
    /// Factors to return from list_second_factors
    factors: Arc<Mutex<Vec<SecondFactor>>>,
    /// Captured calls for test assertions
    captured: Arc<Mutex<Vec<CapturedCall>>>,
}

/// A captured API call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    /// The API method called (e.g., "login", "delete_totp")
    pub method: &'static str,
    /// Target of the call (switch name, factor ID, username), if any
    pub target: Option<String>,
    /// Credential the call carried
    pub credential: Credential,
}

impl MockDashboardClient {
    /// Create a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next API call.
    /// Each queued error is consumed after one use.
    pub async fn with_error(self, error: ApiError) -> Self {
        self.errors.lock().await.push_back(error);
        self
    }

    /// Configure factors to return from list_second_factors.
    pub async fn with_second_factors(self, factors: Vec<SecondFactor>) -> Self {
        *self.factors.lock().await = factors;
        self
    }

    /// Get all captured calls for test assertions.
    pub async fn captured_calls(&self) -> Vec<CapturedCall> {
        self.captured.lock().await.clone()
    }

    /// Number of calls made.
    pub async fn call_count(&self) -> usize {
        self.captured.lock().await.len()
    }

    /// Record a call, then fail with the next queued error if there is one
    async fn record(
        &self,
        method: &'static str,
        target: Option<&str>,
        credential: Credential,
    ) -> ApiResult<()> {
        self.captured.lock().await.push(CapturedCall {
            method,
            target: target.map(str::to_string),
            credential,
        });

        match self.errors.lock().await.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AuthApi for MockDashboardClient {
    async fn login(&self, username: &str, credential: Credential) -> ApiResult<LoginResponse> {
        self.record("login", Some(username), credential).await?;
        Ok(LoginResponse {
            token: "mock-token".to_string(),
            user: UserSnapshot {
                id: "user-1".to_string(),
                username: username.to_string(),
                staff: false,
            },
            expires_at: None,
        })
    }
}

#[async_trait]
impl AdminApi for MockDashboardClient {
    async fn set_kill_switch(
        &self,
        name: &str,
        enabled: bool,
        credential: Credential,
    ) -> ApiResult<KillSwitch> {
        self.record("set_kill_switch", Some(name), credential).await?;
        Ok(KillSwitch {
            name: name.to_string(),
            enabled,
        })
    }

    async fn set_log_level(&self, level: &str, credential: Credential) -> ApiResult<LogLevel> {
        self.record("set_log_level", Some(level), credential).await?;
        Ok(LogLevel {
            level: level.to_string(),
        })
    }
}

#[async_trait]
impl SecurityApi for MockDashboardClient {
    async fn list_second_factors(&self) -> ApiResult<Vec<SecondFactor>> {
        self.record("list_second_factors", None, Credential::None)
            .await?;
        Ok(self.factors.lock().await.clone())
    }

    async fn delete_totp(&self, credential: Credential) -> ApiResult<()> {
        self.record("delete_totp", None, credential).await
    }

    async fn delete_webauthn(&self, id: &str, credential: Credential) -> ApiResult<()> {
        self.record("delete_webauthn", Some(id), credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::FactorKind;

    #[tokio::test]
    async fn test_mock_client_defaults() {
        let mock = MockDashboardClient::new();

        assert!(mock.list_second_factors().await.unwrap().is_empty());
        let switch = mock
            .set_kill_switch("uploads", true, Credential::None)
            .await
            .unwrap();
        assert!(switch.enabled);
        assert_eq!(mock.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_mock_client_errors_are_consumed_in_order() {
        let mock = MockDashboardClient::new()
            .with_error(ApiError::InvalidPassword)
            .await
            .with_error(ApiError::Banned)
            .await;

        assert!(matches!(
            mock.delete_totp(Credential::None).await,
            Err(ApiError::InvalidPassword)
        ));
        assert!(matches!(
            mock.delete_totp(Credential::None).await,
            Err(ApiError::Banned)
        ));
        assert!(mock.delete_totp(Credential::None).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_client_captures_credentials() {
        let mock = MockDashboardClient::new()
            .with_second_factors(vec![SecondFactor {
                id: "k1".to_string(),
                kind: FactorKind::Webauthn,
                name: None,
                created_at: None,
            }])
            .await;

        mock.delete_webauthn("k1", Credential::Password("pw".to_string()))
            .await
            .unwrap();

        let calls = mock.captured_calls().await;
        assert_eq!(calls[0].method, "delete_webauthn");
        assert_eq!(calls[0].target.as_deref(), Some("k1"));
        assert_eq!(calls[0].credential, Credential::Password("pw".to_string()));
        assert_eq!(mock.list_second_factors().await.unwrap().len(), 1);
    }
}
