//! Authentication models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Session, UserSnapshot};

/// Successful `POST /auth/login` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,

    /// The signed-in user
    pub user: UserSnapshot,

    /// Token expiration time, when the API reports one
    #[serde(default, rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl LoginResponse {
    pub fn into_session(self) -> Session {
        Session {
            token: self.token,
            user: self.user,
        }
    }
}
