//! Privileged account and staff actions
//!
//! Every action goes through [`run_privileged`], so any of them may pause
//! for a second-factor challenge and is retried at most once.

use crate::challenge::{ChallengeCoordinator, Credential, Outcome, run_privileged};
use crate::client::DashboardApi;
use crate::client::models::{KillSwitch, LogLevel, LoginResponse, SecondFactor};
use crate::error::Result;
use crate::feedback::Notifier;

/// Server log levels an operator may pick
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Runs privileged calls against one client with one coordinator
pub struct PrivilegedActions<'a, C: DashboardApi> {
    client: &'a C,
    coordinator: &'a ChallengeCoordinator,
    notifier: &'a dyn Notifier,
}

impl<'a, C: DashboardApi> PrivilegedActions<'a, C> {
    pub fn new(
        client: &'a C,
        coordinator: &'a ChallengeCoordinator,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            client,
            coordinator,
            notifier,
        }
    }

    pub async fn login(&self, username: &str, password: String) -> Result<Outcome<LoginResponse>> {
        let client = self.client;
        run_privileged(
            self.coordinator,
            self.notifier,
            Credential::Password(password),
            move |credential| client.login(username, credential),
        )
        .await
    }

    pub async fn set_kill_switch(
        &self,
        name: &str,
        enabled: bool,
    ) -> Result<Outcome<KillSwitch>> {
        let client = self.client;
        run_privileged(
            self.coordinator,
            self.notifier,
            Credential::None,
            move |credential| client.set_kill_switch(name, enabled, credential),
        )
        .await
    }

    pub async fn set_log_level(&self, level: &str) -> Result<Outcome<LogLevel>> {
        let client = self.client;
        run_privileged(
            self.coordinator,
            self.notifier,
            Credential::None,
            move |credential| client.set_log_level(level, credential),
        )
        .await
    }

    /// Not privileged, listed here so callers need only one handle
    pub async fn list_second_factors(&self) -> Result<Vec<SecondFactor>> {
        Ok(self.client.list_second_factors().await?)
    }

    pub async fn delete_totp(&self, credential: Credential) -> Result<Outcome<()>> {
        let client = self.client;
        run_privileged(self.coordinator, self.notifier, credential, move |credential| {
            client.delete_totp(credential)
        })
        .await
    }

    pub async fn delete_webauthn(&self, id: &str, credential: Credential) -> Result<Outcome<()>> {
        let client = self.client;
        run_privileged(self.coordinator, self.notifier, credential, move |credential| {
            client.delete_webauthn(id, credential)
        })
        .await
    }
}
