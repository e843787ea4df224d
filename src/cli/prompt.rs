//! Interactive second-factor prompt
//!
//! The terminal stands in for the challenge UI: while a privileged command
//! runs, [`with_challenge_prompt`] watches the coordinator and asks the user
//! for a code whenever a session opens.

use std::future::Future;

use colored::Colorize;
use dialoguer::{Input, Password, Select, theme::ColorfulTheme};

use crate::challenge::{ChallengeCoordinator, ChallengeInput, ChallengeState, MethodKind};
use crate::error::{Error, Result};

/// What the user chose to do with a challenge
#[derive(Debug)]
enum Answer {
    Respond(ChallengeInput),
    Decline,
}

/// Drive `action` to completion, prompting for every challenge it opens.
pub async fn with_challenge_prompt<T, Fut>(coordinator: &ChallengeCoordinator, action: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let ui = async {
        let mut rx = coordinator.subscribe();
        loop {
            let state = match rx.wait_for(|s| s.is_challenging).await {
                Ok(state) => state.clone(),
                Err(_) => break,
            };

            let answer = tokio::task::spawn_blocking(move || ask(&state))
                .await
                .map_err(|e| Error::Other(e.to_string()))
                .and_then(|answer| answer);

            resolve(coordinator, answer);
        }
    };

    tokio::pin!(action);
    tokio::select! {
        output = &mut action => output,
        () = ui => action.await,
    }
}

/// Hand the user's answer to the coordinator
fn resolve(coordinator: &ChallengeCoordinator, answer: Result<Answer>) {
    match answer {
        Ok(Answer::Respond(input)) => {
            if let Err(e) = coordinator.select_method(input.kind()) {
                log::debug!("Selecting {} failed: {}", input.kind(), e);
            }
            if let Err(e) = coordinator.complete_challenge(input) {
                eprintln!("{} {}", "✗".red(), e);
                coordinator.cancel_challenge();
            }
        }
        Ok(Answer::Decline) => {
            coordinator.cancel_challenge();
        }
        Err(e) => {
            log::warn!("Second-factor prompt failed: {}", e);
            coordinator.cancel_challenge();
        }
    }
}

/// Blocking prompt for one challenge. Empty input declines.
fn ask(state: &ChallengeState) -> Result<Answer> {
    let theme = ColorfulTheme::default();
    eprintln!("\n{}", "Second-factor verification required".bold());

    let method = match state.methods.as_slice() {
        [] => return Ok(Answer::Decline),
        [only] => *only,
        methods => {
            let labels: Vec<&str> = methods.iter().map(MethodKind::label).collect();
            let default = state
                .selected_method
                .and_then(|selected| methods.iter().position(|m| *m == selected))
                .unwrap_or(0);

            match Select::with_theme(&theme)
                .with_prompt("Verify with")
                .items(&labels)
                .default(default)
                .interact_opt()?
            {
                Some(idx) => methods[idx],
                None => return Ok(Answer::Decline),
            }
        }
    };

    let answer = match method {
        MethodKind::Totp | MethodKind::Backup => {
            let code: String = Password::with_theme(&theme)
                .with_prompt(method.label())
                .allow_empty_password(true)
                .interact()?;
            let code = code.trim().to_string();
            if code.is_empty() {
                Answer::Decline
            } else if method == MethodKind::Totp {
                Answer::Respond(ChallengeInput::Totp { code })
            } else {
                Answer::Respond(ChallengeInput::Backup { code })
            }
        }
        MethodKind::Webauthn => {
            if let Some(options) = &state.webauthn {
                eprintln!("Assertion options:\n{}", serde_json::to_string_pretty(options)?);
            }
            let raw: String = Input::with_theme(&theme)
                .with_prompt("Paste the security key assertion (JSON)")
                .allow_empty(true)
                .interact_text()?;
            if raw.trim().is_empty() {
                Answer::Decline
            } else {
                Answer::Respond(ChallengeInput::WebAuthn {
                    assertion: serde_json::from_str(&raw)?,
                })
            }
        }
    };

    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeContext;

    fn open(coordinator: &ChallengeCoordinator) -> crate::challenge::PendingChallenge {
        coordinator
            .start_challenge(ChallengeContext {
                methods: vec![MethodKind::Totp, MethodKind::Backup],
                token: "cont".to_string(),
                webauthn: None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_respond_completes_with_chosen_method() {
        let coordinator = ChallengeCoordinator::new();
        let pending = open(&coordinator);

        resolve(
            &coordinator,
            Ok(Answer::Respond(ChallengeInput::Backup {
                code: "abcd-1234".to_string(),
            })),
        );

        let response = pending.await.unwrap();
        assert_eq!(response.kind, MethodKind::Backup);
        assert!(!coordinator.is_challenging());
    }

    #[tokio::test]
    async fn test_resolve_decline_and_prompt_failure_cancel() {
        let coordinator = ChallengeCoordinator::new();

        let pending = open(&coordinator);
        resolve(&coordinator, Ok(Answer::Decline));
        assert_eq!(pending.await, None);

        let pending = open(&coordinator);
        resolve(&coordinator, Err(Error::Other("not a terminal".to_string())));
        assert_eq!(pending.await, None);
    }

    #[tokio::test]
    async fn test_action_without_challenge_skips_prompt() {
        let coordinator = ChallengeCoordinator::new();
        let value = with_challenge_prompt(&coordinator, async { 42 }).await;
        assert_eq!(value, 42);
    }
}
