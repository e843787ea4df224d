//! Command execution context
//!
//! Provides a unified context for command execution, eliminating boilerplate
//! for config loading, router construction, and client initialization.

use std::sync::Arc;

use url::Url;

use crate::cache::CacheStorage;
use crate::cli::{GlobalOptions, OutputFormat};
use crate::client::DashboardClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::HttpFetcher;
use crate::router::OfflineRouter;

/// Router type every command uses
pub type LiveRouter = OfflineRouter<HttpFetcher>;

/// Context for command execution containing config and runtime options.
pub struct CommandContext {
    /// Loaded and validated configuration
    pub config: Config,
    /// Config path override, kept so changes are written back to the same file
    pub config_path: Option<String>,
    /// Output format preference
    pub format: OutputFormat,
    /// Route as if offline
    pub offline: bool,
}

impl CommandContext {
    /// Load the configuration named by the global options.
    ///
    /// A missing config file is not an error; defaults are used until the
    /// first change is saved.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_at(opts.config_ref())?;
        Ok(Self {
            config,
            config_path: opts.config.clone(),
            format: opts.format,
            offline: opts.offline,
        })
    }

    pub fn config_ref(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    /// Open the cache and build a router for the configured origin
    pub fn router(&self) -> Result<Arc<LiveRouter>> {
        let storage = CacheStorage::open()?;
        let fetcher = HttpFetcher::new(self.config.origin_url()?)?;
        let router = OfflineRouter::from_config(fetcher, storage, &self.config)?;
        router.set_online(!self.offline);
        Ok(Arc::new(router))
    }

    /// API client carrying the stored session, if any
    pub fn client(&self) -> Result<DashboardClient> {
        DashboardClient::from_config(&self.config)
    }

    /// Resolve a CLI URL argument: absolute URLs pass through, anything
    /// else is a path on the dashboard origin.
    pub fn resolve_url(&self, input: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(input) {
            return Ok(url);
        }
        self.config
            .origin_url()?
            .join(input)
            .map_err(|e| Error::Other(format!("Invalid URL '{}': {}", input, e)))
    }
}
