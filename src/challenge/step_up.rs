//! Two-tier retry for privileged operations
//!
//! The first attempt carries whatever the user supplied. If the API demands
//! step-up authentication, the coordinator collects a second factor and the
//! operation is retried exactly once with it.

use std::future::Future;

use serde_json::{Map, Value};

use super::{ChallengeCoordinator, ChallengeResponse};
use crate::error::{ApiError, ErrorCode, Result};
use crate::feedback::{self, Handling, Notifier};

/// Proof of identity attached to a privileged request
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    /// Nothing beyond the session token
    None,
    Password(String),
    SecondFactor(ChallengeResponse),
}

impl Credential {
    /// Request body fields carrying this credential
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        match self {
            Credential::None => {}
            Credential::Password(password) => {
                fields.insert("password".to_string(), Value::String(password));
            }
            Credential::SecondFactor(response) => {
                // ChallengeResponse only holds strings and JSON values
                if let Ok(value) = serde_json::to_value(response) {
                    fields.insert("second_factor".to_string(), value);
                }
            }
        }
        fields
    }
}

/// How a privileged operation ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    /// The user declined the challenge; nothing was surfaced
    Cancelled,
    /// A recognized API error was shown to the user
    Failed(ErrorCode),
}

/// Run `operation`, retrying once with a second factor if the API asks for
/// one.
///
/// Errors without a recognized code come back as `Err`.
pub async fn run_privileged<T, Op, Fut>(
    coordinator: &ChallengeCoordinator,
    notifier: &dyn Notifier,
    credential: Credential,
    operation: Op,
) -> Result<Outcome<T>>
where
    Op: Fn(Credential) -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiError>>,
{
    let err = match operation(credential).await {
        Ok(value) => return Ok(Outcome::Completed(value)),
        Err(ApiError::ChallengeRequired(context)) => {
            let pending = coordinator.start_challenge(context)?;
            let Some(response) = pending.await else {
                log::debug!("Step-up challenge declined");
                return Ok(Outcome::Cancelled);
            };

            match operation(Credential::SecondFactor(response)).await {
                Ok(value) => return Ok(Outcome::Completed(value)),
                Err(err) => err,
            }
        }
        Err(err) => err,
    };

    match feedback::handle_api_error(&err, notifier) {
        Handling::Handled(code) => Ok(Outcome::Failed(code)),
        Handling::Unhandled => Err(err.into()),
    }
}
