//! Staff-only administration commands

use colored::Colorize;

use crate::actions::PrivilegedActions;
use crate::challenge::{ChallengeCoordinator, Outcome};
use crate::cli::notifier::TerminalNotifier;
use crate::cli::prompt::with_challenge_prompt;
use crate::cli::{CommandContext, OutputFormat, SwitchState};
use crate::error::{Error, Result};
use crate::output::format_json;

/// Turn `outcome` into the command result. `None` means cancelled.
pub(crate) fn completed<T>(outcome: Outcome<T>, action: &str) -> Result<Option<T>> {
    match outcome {
        Outcome::Completed(value) => Ok(Some(value)),
        Outcome::Cancelled => {
            println!("{} cancelled", action);
            Ok(None)
        }
        Outcome::Failed(code) => Err(Error::Other(format!("{} failed ({})", action, code.as_str()))),
    }
}

/// Run `admin kill-switch`
pub async fn kill_switch(ctx: &CommandContext, name: &str, state: SwitchState) -> Result<()> {
    ctx.config.require_session()?;
    let client = ctx.client()?;
    let coordinator = ChallengeCoordinator::new();
    let notifier = TerminalNotifier::new(ctx.config_ref());
    let actions = PrivilegedActions::new(&client, &coordinator, &notifier);

    let outcome = with_challenge_prompt(
        &coordinator,
        actions.set_kill_switch(name, state.enabled()),
    )
    .await?;
    let Some(switch) = completed(outcome, "Kill switch update")? else {
        return Ok(());
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&switch)?),
        _ => println!(
            "{} Kill switch {} is now {}",
            "✓".green(),
            switch.name.bold(),
            if switch.enabled { "on".red() } else { "off".green() }
        ),
    }
    Ok(())
}

/// Run `admin log-level`
pub async fn log_level(ctx: &CommandContext, level: &str) -> Result<()> {
    ctx.config.require_session()?;
    let client = ctx.client()?;
    let coordinator = ChallengeCoordinator::new();
    let notifier = TerminalNotifier::new(ctx.config_ref());
    let actions = PrivilegedActions::new(&client, &coordinator, &notifier);

    let outcome = with_challenge_prompt(&coordinator, actions.set_log_level(level)).await?;
    let Some(applied) = completed(outcome, "Log level update")? else {
        return Ok(());
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&applied)?),
        _ => println!("{} Server log level set to {}", "✓".green(), applied.level.bold()),
    }
    Ok(())
}
