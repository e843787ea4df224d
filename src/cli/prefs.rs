//! Preference commands

use colored::Colorize;

use crate::cli::{CommandContext, OutputFormat};
use crate::config::{Config, Preferences};
use crate::error::Result;
use crate::output::{format_json, table::format_pairs};

fn on_off(value: bool) -> String {
    let label = if value { "on" } else { "off" };
    label.to_string()
}

/// Show current preferences
pub fn show(ctx: &CommandContext) -> Result<()> {
    let prefs = &ctx.config.preferences;

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(prefs)?),
        _ => {
            let seen = if prefs.seen_warnings.is_empty() {
                "-".to_string()
            } else {
                prefs
                    .seen_warnings
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!(
                "{}",
                format_pairs(&[
                    ("dark-theme", on_off(prefs.dark_theme)),
                    ("twelve-hour-clock", on_off(prefs.twelve_hour_clock)),
                    ("seen-warnings", seen),
                ])
            );
        }
    }

    Ok(())
}

/// Set a boolean preference and save it
pub fn set(ctx: &CommandContext, key: &str, value: bool) -> Result<()> {
    // Reject unknown keys before touching the file
    let mut probe = Preferences::default();
    probe.set(key, value)?;

    let config = Config::update_at(ctx.config_ref(), |config| {
        // Key already validated above
        let _ = config.preferences.set(key, value);
    })?;

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&config.preferences)?),
        _ => println!("{} {} = {}", "✓".green(), key, on_off(value)),
    }
    Ok(())
}

/// Record that a warning has been dismissed
pub fn seen(ctx: &CommandContext, warning: &str) -> Result<()> {
    let mut first_time = false;
    Config::update_at(ctx.config_ref(), |config| {
        first_time = config.preferences.mark_seen(warning);
    })?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({ "warning": warning, "first_time": first_time });
            println!("{}", format_json(&json)?);
        }
        _ if first_time => println!("{} Warning '{}' marked as seen", "✓".green(), warning),
        _ => println!("Warning '{}' was already seen", warning),
    }
    Ok(())
}
