//! Login command: password sign-in with second-factor step-up

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::actions::PrivilegedActions;
use crate::challenge::{ChallengeCoordinator, Outcome};
use crate::cli::notifier::TerminalNotifier;
use crate::cli::prompt::with_challenge_prompt;
use crate::cli::{CommandContext, OutputFormat};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::format_json;

/// Run `login`, prompting for anything not given on the command line
pub async fn run(ctx: &CommandContext, username: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();

    let username = match username {
        Some(username) => username,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Username")
            .interact_text()?,
    };
    let password: String = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;

    let client = ctx.client()?;
    let coordinator = ChallengeCoordinator::new();
    let notifier = TerminalNotifier::new(ctx.config_ref());
    let actions = PrivilegedActions::new(&client, &coordinator, &notifier);

    let outcome = with_challenge_prompt(&coordinator, actions.login(&username, password)).await?;

    let login = match outcome {
        Outcome::Completed(login) => login,
        Outcome::Cancelled => {
            println!("Login cancelled");
            return Ok(());
        }
        // The notifier already told the user what went wrong
        Outcome::Failed(code) => {
            return Err(Error::Other(format!("Login failed ({})", code.as_str())));
        }
    };

    let session = login.into_session();
    let user = session.user.clone();
    Config::update_at(ctx.config_ref(), |config| config.session = Some(session))?;

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&user)?),
        _ => println!(
            "{} Signed in as {}{}",
            "✓".green(),
            user.username.bold(),
            if user.staff { " (staff)" } else { "" }
        ),
    }
    Ok(())
}
