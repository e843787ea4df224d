//! Error types for filedash

use std::time::Duration;
use thiserror::Error;

use crate::challenge::ChallengeContext;

/// Result type alias for filedash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Error codes the dashboard API is known to return.
///
/// Each recognized code maps to exactly one user-visible notification in
/// [`crate::feedback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Banned,
    Ratelimited,
    InvalidSession,
    InsufficientPermissions,
    Internal,
    Generic,
    MissingFields,
    InvalidPassword,
    ChallengeRequired,
}

impl ErrorCode {
    /// Parse the wire representation of an error code.
    pub fn parse(code: &str) -> Option<Self> {
        let code = match code {
            "BANNED_ERROR" => ErrorCode::Banned,
            "RATELIMITED_ERROR" => ErrorCode::Ratelimited,
            "INVALID_SESSION_ERROR" => ErrorCode::InvalidSession,
            "INSUFFICIENT_PERMISSIONS_ERROR" => ErrorCode::InsufficientPermissions,
            "INTERNAL_ERROR" => ErrorCode::Internal,
            "GENERIC_ERROR" => ErrorCode::Generic,
            "MISSING_FIELDS_ERROR" => ErrorCode::MissingFields,
            "INVALID_PASSWORD_ERROR" => ErrorCode::InvalidPassword,
            "SECOND_FACTOR_CHALLENGE_REQUIRED" => ErrorCode::ChallengeRequired,
            _ => return None,
        };
        Some(code)
    }

    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Banned => "BANNED_ERROR",
            ErrorCode::Ratelimited => "RATELIMITED_ERROR",
            ErrorCode::InvalidSession => "INVALID_SESSION_ERROR",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS_ERROR",
            ErrorCode::Internal => "INTERNAL_ERROR",
            ErrorCode::Generic => "GENERIC_ERROR",
            ErrorCode::MissingFields => "MISSING_FIELDS_ERROR",
            ErrorCode::InvalidPassword => "INVALID_PASSWORD_ERROR",
            ErrorCode::ChallengeRequired => "SECOND_FACTOR_CHALLENGE_REQUIRED",
        }
    }
}

/// API-related errors
///
/// Typed codes returned by the dashboard API come first, followed by
/// transport and decoding failures that never reached a typed response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Your account has been banned.")]
    Banned,

    #[error("You are being rate limited. Retry after {0:?}")]
    Ratelimited(Duration),

    #[error("Your session is no longer valid. Run `filedash login` to sign in again.")]
    InvalidSession,

    #[error("You don't have permission to perform this action.")]
    InsufficientPermissions,

    #[error("The server ran into an internal error: {0}")]
    Internal(String),

    #[error("Request failed: {0}")]
    Generic(String),

    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("The password you entered is incorrect.")]
    InvalidPassword,

    #[error("Second-factor verification required")]
    ChallengeRequired(ChallengeContext),

    #[error("Unrecognized API error {code}: {message}")]
    Unrecognized { code: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// The recognized error code for this error, if it has one
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiError::Banned => Some(ErrorCode::Banned),
            ApiError::Ratelimited(_) => Some(ErrorCode::Ratelimited),
            ApiError::InvalidSession => Some(ErrorCode::InvalidSession),
            ApiError::InsufficientPermissions => Some(ErrorCode::InsufficientPermissions),
            ApiError::Internal(_) => Some(ErrorCode::Internal),
            ApiError::Generic(_) => Some(ErrorCode::Generic),
            ApiError::MissingFields(_) => Some(ErrorCode::MissingFields),
            ApiError::InvalidPassword => Some(ErrorCode::InvalidPassword),
            ApiError::ChallengeRequired(_) => Some(ErrorCode::ChallengeRequired),
            ApiError::Unrecognized { .. } | ApiError::Network(_) | ApiError::InvalidResponse(_) => {
                None
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to API".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `filedash prefs show` to create one.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Not signed in. Run `filedash login` first.")]
    MissingSession,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("Cache lock poisoned")]
    Poisoned,
}

/// Second-factor challenge coordination errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("A second-factor challenge is already in progress")]
    AlreadyActive,

    #[error("No second-factor challenge is in progress")]
    NotActive,

    #[error("The challenge does not offer any second-factor method")]
    NoMethods,

    #[error("Method {0} is not available for this challenge")]
    MethodUnavailable(String),
}

/// Transport failures while routing a request (no response at all)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
