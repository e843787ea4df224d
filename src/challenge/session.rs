//! Second-factor challenge data types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A second-factor method the API may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    /// Time-based one-time code
    Totp,
    /// Platform authenticator assertion
    Webauthn,
    /// Single-use backup code
    #[serde(alias = "backup_code", alias = "backup-code")]
    Backup,
}

impl MethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Totp => "totp",
            MethodKind::Webauthn => "webauthn",
            MethodKind::Backup => "backup",
        }
    }

    /// Human-readable label for prompts
    pub fn label(&self) -> &'static str {
        match self {
            MethodKind::Totp => "Authenticator app code",
            MethodKind::Webauthn => "Security key",
            MethodKind::Backup => "Backup code",
        }
    }
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the API sent back when it asked for step-up authentication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeContext {
    /// Methods the user may answer with, in the API's preference order
    pub methods: Vec<MethodKind>,

    /// Continuation token tying the answer to the paused request
    pub token: String,

    /// WebAuthn assertion options, when a security key is allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webauthn: Option<Value>,
}

/// What the user produced
#[derive(Debug, Clone, PartialEq)]
pub enum ChallengeInput {
    Totp { code: String },
    Backup { code: String },
    WebAuthn { assertion: Value },
}

impl ChallengeInput {
    pub fn kind(&self) -> MethodKind {
        match self {
            ChallengeInput::Totp { .. } => MethodKind::Totp,
            ChallengeInput::Backup { .. } => MethodKind::Backup,
            ChallengeInput::WebAuthn { .. } => MethodKind::Webauthn,
        }
    }
}

/// Normalized answer handed back to the paused caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    #[serde(rename = "type")]
    pub kind: MethodKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<Value>,

    pub token: String,
}

impl ChallengeResponse {
    pub(crate) fn from_input(input: ChallengeInput, token: String) -> Self {
        let kind = input.kind();
        let (code, assertion) = match input {
            ChallengeInput::Totp { code } | ChallengeInput::Backup { code } => {
                (Some(code.trim().to_string()), None)
            }
            ChallengeInput::WebAuthn { assertion } => (None, Some(assertion)),
        };
        Self {
            kind,
            code,
            assertion,
            token,
        }
    }
}

/// Snapshot of the coordinator that observers render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeState {
    pub is_challenging: bool,
    pub methods: Vec<MethodKind>,
    pub selected_method: Option<MethodKind>,
    pub webauthn: Option<Value>,
}
