//! Status command implementation

use colored::Colorize;

use crate::cache::CacheStorage;
use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::error::Result;

/// Run the status command to display configuration status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "filedash status".bold());

    let config_path = Config::resolve_path(opts.config_ref())?;
    let exists = config_path.exists();
    let config = Config::load_at(opts.config_ref())?;

    if exists {
        println!("Config file: {}", config_path.display().to_string().cyan());
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().cyan(),
            "(not created yet, using defaults)".dimmed()
        );
    }
    println!("Origin:      {}", config.origin);
    println!("API:         {}", config.api_url);
    println!();

    match &config.session {
        Some(session) if session.is_expired() => {
            println!(
                "{} Session for {} expired",
                "⚠".yellow(),
                session.user.username.bold()
            );
            println!("  → Run 'filedash login' to sign in again");
        }
        Some(session) => {
            let role = if session.user.staff { " (staff)" } else { "" };
            match session.expires_at() {
                Some(expires) => {
                    let remaining = expires.signed_duration_since(chrono::Utc::now());
                    println!(
                        "{} Signed in as {}{} (expires in {}h {}m)",
                        "✓".green(),
                        session.user.username.bold(),
                        role,
                        remaining.num_hours(),
                        remaining.num_minutes() % 60
                    );
                }
                None => println!(
                    "{} Signed in as {}{}",
                    "✓".green(),
                    session.user.username.bold(),
                    role
                ),
            }
        }
        None => {
            println!("{} Not signed in", "○".dimmed());
            println!("  → Run 'filedash login' to sign in");
        }
    }

    match CacheStorage::cache_dir() {
        Ok(dir) => println!("{} Cache: {}", "○".dimmed(), dir.display()),
        Err(e) => println!("{} Cache unavailable: {}", "✗".red(), e),
    }

    if opts.offline {
        println!("{} Offline mode", "⚠".yellow());
    }
    println!();

    Ok(())
}
