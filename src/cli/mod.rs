//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::actions::LOG_LEVELS;
use crate::cache::Region;

pub mod admin;
pub mod args;
pub mod cache;
pub mod context;
pub mod fetch;
pub mod install;
pub mod login;
pub mod notifier;
pub mod prefs;
pub mod prompt;
pub mod security;
pub mod serve;
pub mod share;
pub mod status;

pub use args::{GlobalOptions, OutputFormat, SwitchState};
pub use context::CommandContext;

/// filedash - offline layer and command-line companion for the file dashboard
#[derive(Parser, Debug)]
#[command(name = "filedash")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "FILEDASH_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "FILEDASH_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "FILEDASH_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Route requests as if the network were down
    #[arg(long, global = true, env = "FILEDASH_OFFLINE", hide_env = true)]
    pub offline: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show configuration, session and cache status
    Status,

    /// Inspect and clear the offline cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Route one GET request through the offline router
    Fetch {
        /// Absolute URL, or a path on the dashboard origin
        url: String,

        /// Write the response body to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Hand a file to the dashboard through the share target
    Share {
        /// File to share
        path: PathBuf,

        /// Content type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Collect a shared file and remove it from the cache
    Take {
        /// Key printed by `filedash share`
        key: i64,

        /// Where to write the file
        #[arg(long, short)]
        output: PathBuf,

        /// Leave the file in the cache after writing it
        #[arg(long)]
        keep: bool,
    },

    /// Repopulate the offline cache from the precache manifest
    Install,

    /// Serve the dashboard origin through the router on a local port
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value_t = 4173, env = "FILEDASH_PORT", hide_env = true)]
        port: u16,
    },

    /// Show and change interface preferences
    #[command(subcommand)]
    Prefs(PrefsCommands),

    /// Sign in to the dashboard
    Login {
        /// Username (prompted when omitted)
        #[arg(long, short)]
        username: Option<String>,
    },

    /// Staff administration
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Manage second factors on your account
    #[command(subcommand)]
    Security(SecurityCommands),
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show per-region statistics
    Status,

    /// Remove cached entries
    Clear {
        /// Only clear this region (offline-cache, preview-icons, shared-files)
        #[arg(long)]
        region: Option<Region>,
    },

    /// Print the cache directory
    Path,
}

/// Preference subcommands
#[derive(Subcommand, Debug)]
pub enum PrefsCommands {
    /// Show current preferences
    Show,

    /// Change a preference (dark-theme, twelve-hour-clock)
    Set {
        /// Preference name
        key: String,

        /// New value (on/off, true/false, yes/no)
        #[arg(action = clap::ArgAction::Set, value_parser = clap::builder::BoolishValueParser::new())]
        value: bool,
    },

    /// Mark a warning as seen so it is not shown again
    Seen {
        /// Warning identifier
        warning: String,
    },
}

/// Staff administration subcommands
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Turn a kill switch on or off
    KillSwitch {
        /// Switch name
        name: String,

        /// Desired state
        state: SwitchState,
    },

    /// Change the server log level
    LogLevel {
        /// New level
        #[arg(value_parser = clap::builder::PossibleValuesParser::new(LOG_LEVELS))]
        level: String,
    },
}

/// Second-factor subcommands
#[derive(Subcommand, Debug)]
pub enum SecurityCommands {
    /// List enrolled second factors
    List,

    /// Remove the authenticator app
    DeleteTotp,

    /// Remove a security key
    DeleteWebauthn {
        /// Security key ID (see `filedash security list`)
        id: String,
    },
}
