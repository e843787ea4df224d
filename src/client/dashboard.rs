//! Dashboard API client implementation

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::api::{AdminApi, ApiResult, AuthApi, SecurityApi};
use super::models::{KillSwitch, LogLevel, LoginResponse, SecondFactor};
use crate::challenge::{ChallengeContext, Credential, MethodKind};
use crate::config::Config;
use crate::error::{ApiError, ErrorCode, Result};

/// Rate limit: 6 requests per second
const RATE_LIMIT_PER_SECOND: NonZeroU32 = NonZeroU32::new(6).unwrap();

/// Fallback wait when a rate-limited response carries no hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Dashboard API client
pub struct DashboardClient {
    http: HttpClient,
    base_url: String,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    token: Arc<RwLock<Option<String>>>,
}

/// Error body shared by every endpoint.
///
/// Read field by field so one malformed field never hides the code.
#[derive(Debug, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    methods: Option<Vec<MethodKind>>,
    token: Option<String>,
    webauthn: Option<Value>,
    retry_after: Option<u64>,
}

impl ErrorBody {
    fn parse(text: &str) -> Self {
        let Ok(Value::Object(body)) = serde_json::from_str::<Value>(text) else {
            return Self::default();
        };
        let string = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);

        // Methods this client cannot answer with are dropped, not fatal
        let methods = body.get("methods").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| match MethodKind::deserialize(item) {
                    Ok(kind) => Some(kind),
                    Err(_) => {
                        log::debug!("Ignoring unsupported second-factor method {}", item);
                        None
                    }
                })
                .collect::<Vec<_>>()
        });

        Self {
            code: string("code"),
            message: string("message"),
            methods,
            token: string("token"),
            webauthn: body.get("webauthn").filter(|v| !v.is_null()).cloned(),
            retry_after: body.get("retryAfter").and_then(Value::as_u64),
        }
    }
}

impl DashboardClient {
    /// Create a new dashboard API client
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("filedash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            RATE_LIMIT_PER_SECOND,
        )));

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter,
            token: Arc::new(RwLock::new(token)),
        })
    }

    /// Client for the configured API, signed in if a session is stored
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.session.as_ref().map(|s| s.token.clone());
        Self::new(&config.api_url, token)
    }

    /// Replace the bearer token
    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    /// Send a request and return the raw response when it succeeded
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        log::debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(token) = self.token.read().await.as_deref() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.unwrap_or_default();
        Err(map_error(status, retry_after, &text))
    }

    /// Make a request and decode the JSON body
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let response = self.send(method, path, body).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Make a request whose response body is ignored
    async fn request_empty(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<()> {
        self.send(method, path, body).await.map(|_| ())
    }
}

/// Build a JSON body from `fields` plus the credential
fn with_credential(fields: Map<String, Value>, credential: Credential) -> Value {
    let mut body = fields;
    body.extend(credential.into_fields());
    Value::Object(body)
}

/// Body of an authenticated DELETE, or none if there is nothing to send
fn credential_body(credential: Credential) -> Option<Value> {
    let fields = credential.into_fields();
    (!fields.is_empty()).then_some(Value::Object(fields))
}

/// Map a failed response to an [`ApiError`].
///
/// The error body's code wins; the status is only consulted when the body
/// carries no code at all.
pub(crate) fn map_error(status: StatusCode, retry_after: Option<u64>, text: &str) -> ApiError {
    let body = ErrorBody::parse(text);
    let message = body.message.unwrap_or_default();

    let Some(code) = body.code else {
        return match status {
            StatusCode::UNAUTHORIZED => ApiError::InvalidSession,
            StatusCode::FORBIDDEN => ApiError::InsufficientPermissions,
            StatusCode::TOO_MANY_REQUESTS => ApiError::Ratelimited(
                retry_after.map(Duration::from_secs).unwrap_or(DEFAULT_RETRY_AFTER),
            ),
            status if status.is_server_error() => ApiError::Internal(if text.is_empty() {
                format!("Server error: {}", status)
            } else {
                text.to_string()
            }),
            status => ApiError::InvalidResponse(format!("Unexpected status code: {}", status)),
        };
    };

    let Some(known) = ErrorCode::parse(&code) else {
        return ApiError::Unrecognized {
            code,
            message,
        };
    };

    match known {
        ErrorCode::Banned => ApiError::Banned,
        ErrorCode::Ratelimited => ApiError::Ratelimited(
            body.retry_after
                .or(retry_after)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER),
        ),
        ErrorCode::InvalidSession => ApiError::InvalidSession,
        ErrorCode::InsufficientPermissions => ApiError::InsufficientPermissions,
        ErrorCode::Internal => ApiError::Internal(message),
        ErrorCode::Generic => ApiError::Generic(message),
        ErrorCode::MissingFields => ApiError::MissingFields(message),
        ErrorCode::InvalidPassword => ApiError::InvalidPassword,
        ErrorCode::ChallengeRequired => match (body.methods, body.token) {
            (Some(methods), Some(token)) if !methods.is_empty() => ApiError::ChallengeRequired(ChallengeContext {
                methods,
                token,
                webauthn: body.webauthn,
            }),
            _ => ApiError::InvalidResponse(
                "Challenge response offers no supported method or no token".to_string(),
            ),
        },
    }
}

#[async_trait]
impl AuthApi for DashboardClient {
    async fn login(&self, username: &str, credential: Credential) -> ApiResult<LoginResponse> {
        let mut fields = Map::new();
        fields.insert("username".to_string(), Value::String(username.to_string()));
        let body = with_credential(fields, credential);

        let login: LoginResponse = self.request(Method::POST, "/auth/login", Some(body)).await?;
        self.set_token(Some(login.token.clone())).await;
        Ok(login)
    }
}

#[async_trait]
impl AdminApi for DashboardClient {
    async fn set_kill_switch(
        &self,
        name: &str,
        enabled: bool,
        credential: Credential,
    ) -> ApiResult<KillSwitch> {
        let mut fields = Map::new();
        fields.insert("enabled".to_string(), Value::Bool(enabled));
        let body = with_credential(fields, credential);

        let path = format!("/admin/kill-switches/{}", name);
        self.request(Method::PATCH, &path, Some(body)).await
    }

    async fn set_log_level(&self, level: &str, credential: Credential) -> ApiResult<LogLevel> {
        let mut fields = Map::new();
        fields.insert("level".to_string(), Value::String(level.to_string()));
        let body = with_credential(fields, credential);
        self.request(Method::PATCH, "/admin/log-level", Some(body)).await
    }
}

#[async_trait]
impl SecurityApi for DashboardClient {
    async fn list_second_factors(&self) -> ApiResult<Vec<SecondFactor>> {
        #[derive(Deserialize)]
        struct FactorsResponse {
            factors: Vec<SecondFactor>,
        }

        let response: FactorsResponse = self.request(Method::GET, "/users/@me/mfa", None).await?;
        Ok(response.factors)
    }

    async fn delete_totp(&self, credential: Credential) -> ApiResult<()> {
        self.request_empty(
            Method::DELETE,
            "/users/@me/mfa/totp",
            credential_body(credential),
        )
        .await
    }

    async fn delete_webauthn(&self, id: &str, credential: Credential) -> ApiResult<()> {
        let path = format!("/users/@me/mfa/webauthn/{}", id);
        self.request_empty(Method::DELETE, &path, credential_body(credential))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeResponse;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = DashboardClient::new("https://api.dash.test/v1/", None);
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "https://api.dash.test/v1");
    }

    #[test]
    fn test_map_error_known_codes() {
        let err = map_error(
            StatusCode::FORBIDDEN,
            None,
            r#"{"code":"BANNED_ERROR","message":"bye"}"#,
        );
        assert!(matches!(err, ApiError::Banned));

        let err = map_error(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"code":"MISSING_FIELDS_ERROR","message":"username"}"#,
        );
        assert!(matches!(err, ApiError::MissingFields(m) if m == "username"));
    }

    #[test]
    fn test_map_error_unknown_code() {
        let err = map_error(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"code":"TEAPOT_ERROR","message":"short and stout"}"#,
        );
        match err {
            ApiError::Unrecognized { code, message } => {
                assert_eq!(code, "TEAPOT_ERROR");
                assert_eq!(message, "short and stout");
            }
            other => panic!("Expected Unrecognized, got {:?}", other),
        }
    }

    #[test]
    fn test_map_error_challenge_body() {
        let err = map_error(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"code":"SECOND_FACTOR_CHALLENGE_REQUIRED","message":"step up","methods":["totp","webauthn"],"token":"cont-9","webauthn":{"challenge":"abc"}}"#,
        );
        match err {
            ApiError::ChallengeRequired(ctx) => {
                assert_eq!(ctx.methods, vec![MethodKind::Totp, MethodKind::Webauthn]);
                assert_eq!(ctx.token, "cont-9");
                assert!(ctx.webauthn.is_some());
            }
            other => panic!("Expected ChallengeRequired, got {:?}", other),
        }
    }

    #[test]
    fn test_map_error_challenge_skips_unsupported_methods() {
        let err = map_error(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"code":"SECOND_FACTOR_CHALLENGE_REQUIRED","methods":["sms","totp"],"token":"cont-2"}"#,
        );
        match err {
            ApiError::ChallengeRequired(ctx) => {
                assert_eq!(ctx.methods, vec![MethodKind::Totp]);
                assert_eq!(ctx.token, "cont-2");
            }
            other => panic!("Expected ChallengeRequired, got {:?}", other),
        }

        // Nothing answerable is a bad response, never a session error
        let err = map_error(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"code":"SECOND_FACTOR_CHALLENGE_REQUIRED","methods":["sms"],"token":"cont-3"}"#,
        );
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_map_error_code_survives_malformed_fields() {
        let err = map_error(
            StatusCode::FORBIDDEN,
            None,
            r#"{"code":"BANNED_ERROR","message":null}"#,
        );
        assert!(matches!(err, ApiError::Banned));

        let err = map_error(
            StatusCode::BAD_REQUEST,
            Some(5),
            r#"{"code":"GENERIC_ERROR","message":42,"retryAfter":"soon"}"#,
        );
        assert!(matches!(err, ApiError::Generic(m) if m.is_empty()));
    }

    #[test]
    fn test_map_error_challenge_without_token() {
        let err = map_error(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"code":"SECOND_FACTOR_CHALLENGE_REQUIRED","methods":["totp"]}"#,
        );
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_map_error_rate_limit_hints() {
        let err = map_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(12),
            r#"{"code":"RATELIMITED_ERROR"}"#,
        );
        assert!(matches!(err, ApiError::Ratelimited(d) if d == Duration::from_secs(12)));

        let err = map_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(12),
            r#"{"code":"RATELIMITED_ERROR","retryAfter":3}"#,
        );
        assert!(matches!(err, ApiError::Ratelimited(d) if d == Duration::from_secs(3)));

        let err = map_error(StatusCode::TOO_MANY_REQUESTS, None, "");
        assert!(matches!(err, ApiError::Ratelimited(d) if d == DEFAULT_RETRY_AFTER));
    }

    #[test]
    fn test_map_error_without_body_falls_back_to_status() {
        assert!(matches!(
            map_error(StatusCode::UNAUTHORIZED, None, ""),
            ApiError::InvalidSession
        ));
        assert!(matches!(
            map_error(StatusCode::FORBIDDEN, None, "<html>"),
            ApiError::InsufficientPermissions
        ));
        assert!(matches!(
            map_error(StatusCode::BAD_GATEWAY, None, "upstream"),
            ApiError::Internal(m) if m == "upstream"
        ));
        assert!(matches!(
            map_error(StatusCode::IM_A_TEAPOT, None, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_login_sends_password_and_stores_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({"username": "ada", "password": "pw"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"tok-1","user":{"id":"u1","username":"ada","staff":true}}"#)
            .create_async()
            .await;

        let client = DashboardClient::new(&server.url(), None).unwrap();
        let login = client
            .login("ada", Credential::Password("pw".to_string()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(login.token, "tok-1");
        assert!(login.user.staff);
        assert_eq!(client.token.read().await.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_kill_switch_with_second_factor() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/admin/kill-switches/uploads")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::Json(json!({
                "enabled": false,
                "second_factor": {"type": "totp", "code": "123456", "token": "cont"}
            })))
            .with_status(200)
            .with_body(r#"{"name":"uploads","enabled":false}"#)
            .create_async()
            .await;

        let client = DashboardClient::new(&server.url(), Some("tok".to_string())).unwrap();
        let switch = client
            .set_kill_switch(
                "uploads",
                false,
                Credential::SecondFactor(ChallengeResponse {
                    kind: MethodKind::Totp,
                    code: Some("123456".to_string()),
                    assertion: None,
                    token: "cont".to_string(),
                }),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            switch,
            KillSwitch {
                name: "uploads".to_string(),
                enabled: false
            }
        );
    }

    #[tokio::test]
    async fn test_delete_totp_surfaces_challenge() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/users/@me/mfa/totp")
            .with_status(401)
            .with_body(
                r#"{"code":"SECOND_FACTOR_CHALLENGE_REQUIRED","message":"","methods":["totp"],"token":"c1"}"#,
            )
            .create_async()
            .await;

        let client = DashboardClient::new(&server.url(), Some("tok".to_string())).unwrap();
        let err = client.delete_totp(Credential::None).await.unwrap_err();
        assert!(matches!(err, ApiError::ChallengeRequired(ctx) if ctx.token == "c1"));
    }

    #[tokio::test]
    async fn test_list_second_factors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/@me/mfa")
            .with_status(200)
            .with_body(r#"{"factors":[{"id":"totp","type":"totp"},{"id":"k1","type":"webauthn","name":"Key"}]}"#)
            .create_async()
            .await;

        let client = DashboardClient::new(&server.url(), Some("tok".to_string())).unwrap();
        let factors = client.list_second_factors().await.unwrap();
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[1].id, "k1");
    }

    #[tokio::test]
    async fn test_insufficient_permissions_by_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/admin/log-level")
            .with_status(403)
            .with_body(r#"{"code":"INSUFFICIENT_PERMISSIONS_ERROR","message":"staff only"}"#)
            .create_async()
            .await;

        let client = DashboardClient::new(&server.url(), Some("tok".to_string())).unwrap();
        let err = client
            .set_log_level("debug", Credential::None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InsufficientPermissions));
    }
}
