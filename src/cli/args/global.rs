//! Global CLI options shared across all commands
//!
//! Consolidates the global flags into a single value so handler signatures
//! stay short. Precedence is: CLI flag > environment variable > config file
//! > default.

use crate::cli::{Cli, OutputFormat};

/// Global CLI options passed to all command handlers.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format (pretty, table, json)
    pub format: OutputFormat,

    /// Custom config file path (defaults to ~/.filedash/config.yaml)
    pub config: Option<String>,

    /// Route as if the network were unreachable
    pub offline: bool,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            offline: cli.offline,
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }
}
