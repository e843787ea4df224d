//! Second-factor enrollment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an enrolled second factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorKind {
    Totp,
    Webauthn,
}

impl std::fmt::Display for FactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorKind::Totp => write!(f, "totp"),
            FactorKind::Webauthn => write!(f, "webauthn"),
        }
    }
}

/// An enrolled second factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondFactor {
    /// Factor ID (WebAuthn credentials are deleted by ID)
    pub id: String,

    #[serde(rename = "type")]
    pub kind: FactorKind,

    /// User-chosen label (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the factor was enrolled (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
