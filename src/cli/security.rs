//! Second-factor management for the signed-in account

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::actions::PrivilegedActions;
use crate::challenge::{ChallengeCoordinator, Credential};
use crate::cli::admin::completed;
use crate::cli::notifier::TerminalNotifier;
use crate::cli::prompt::with_challenge_prompt;
use crate::cli::{CommandContext, OutputFormat};
use crate::client::DashboardClient;
use crate::client::models::SecondFactor;
use crate::error::Result;
use crate::output::{format_json, print_rows};

#[derive(Debug, Serialize, Tabled)]
struct FactorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "TYPE")]
    kind: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ENROLLED")]
    enrolled: String,
}

impl From<SecondFactor> for FactorRow {
    fn from(factor: SecondFactor) -> Self {
        Self {
            id: factor.id,
            kind: factor.kind.to_string(),
            name: factor.name.unwrap_or_else(|| "-".to_string()),
            enrolled: factor
                .created_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

struct Account {
    client: DashboardClient,
    coordinator: ChallengeCoordinator,
    notifier: TerminalNotifier,
}

impl Account {
    fn open(ctx: &CommandContext) -> Result<Self> {
        ctx.config.require_session()?;
        Ok(Self {
            client: ctx.client()?,
            coordinator: ChallengeCoordinator::new(),
            notifier: TerminalNotifier::new(ctx.config_ref()),
        })
    }

    fn actions(&self) -> PrivilegedActions<'_, DashboardClient> {
        PrivilegedActions::new(&self.client, &self.coordinator, &self.notifier)
    }
}

/// Run `security list`
pub async fn list(ctx: &CommandContext) -> Result<()> {
    let account = Account::open(ctx)?;
    let factors = account.actions().list_second_factors().await?;

    if ctx.format == OutputFormat::Json {
        println!("{}", format_json(&factors)?);
        return Ok(());
    }
    let rows: Vec<FactorRow> = factors.into_iter().map(FactorRow::from).collect();
    print_rows(&rows, ctx.format)
}

/// Run `security delete-totp`
pub async fn delete_totp(ctx: &CommandContext) -> Result<()> {
    let account = Account::open(ctx)?;
    let actions = account.actions();
    let outcome =
        with_challenge_prompt(&account.coordinator, actions.delete_totp(Credential::None)).await?;

    if completed(outcome, "Removing the authenticator app")?.is_some() {
        println!("{} Authenticator app removed", "✓".green());
    }
    Ok(())
}

/// Run `security delete-webauthn`
pub async fn delete_webauthn(ctx: &CommandContext, id: &str) -> Result<()> {
    let account = Account::open(ctx)?;
    let actions = account.actions();
    let outcome = with_challenge_prompt(
        &account.coordinator,
        actions.delete_webauthn(id, Credential::None),
    )
    .await?;

    if completed(outcome, "Removing the security key")?.is_some() {
        println!("{} Security key {} removed", "✓".green(), id.bold());
    }
    Ok(())
}
