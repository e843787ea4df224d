//! Configuration and persisted client state for filedash
//!
//! Everything the dashboard keeps between runs lives in one YAML file:
//! endpoints, the precache manifest, UI preferences and the signed-in
//! session. The file is read on startup and written on every change.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default dashboard origin
const DEFAULT_ORIGIN: &str = "https://dashboard.example.com";

/// Default API base URL
const DEFAULT_API_URL: &str = "https://api.example.com/v1";

/// Default host serving preview thumbnails
const DEFAULT_THUMBNAIL_HOST: &str = "thumbnails.example.com";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin the dashboard is served from
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Base URL of the dashboard API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Host that serves preview thumbnails
    #[serde(default = "default_thumbnail_host")]
    pub thumbnail_host: String,

    /// Paths fetched into the offline cache on install
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// User interface preferences
    #[serde(default)]
    pub preferences: Preferences,

    /// Signed-in session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

/// User interface preferences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Render with the dark theme
    #[serde(default)]
    pub dark_theme: bool,

    /// Show times on a 12-hour clock
    #[serde(default)]
    pub twelve_hour_clock: bool,

    /// Warnings the user has already dismissed
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub seen_warnings: BTreeSet<String>,
}

/// Authenticated session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token
    pub token: String,

    /// Snapshot of the signed-in user
    pub user: UserSnapshot,
}

/// The parts of the user record the dashboard keeps offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub staff: bool,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_thumbnail_host() -> String {
    DEFAULT_THUMBNAIL_HOST.to_string()
}

fn default_precache() -> Vec<String> {
    vec![
        "/index.html".to_string(),
        "/dashboard".to_string(),
        "/manifest.webmanifest".to_string(),
        "/favicon.ico".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            api_url: default_api_url(),
            thumbnail_host: default_thumbnail_host(),
            precache: default_precache(),
            preferences: Preferences::default(),
            session: None,
        }
    }
}

impl Session {
    /// Expiry encoded in the token, when the token is a JWT.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

        #[derive(Deserialize)]
        struct Claims {
            exp: i64,
        }

        let payload = self.token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        DateTime::from_timestamp(claims.exp, 0)
    }

    /// Whether the token is known to be expired
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|exp| exp < Utc::now())
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".filedash").join("config.yaml"))
    }

    /// Resolve an optional override to a concrete path
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration at the given override, falling back to defaults
    /// when no file exists yet.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        match Self::load_from(&path) {
            Err(crate::error::Error::Config(ConfigError::NotFound)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // Session tokens live here, keep the file private
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Save configuration at the given override or the default path
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(&Self::resolve_path(path)?)
    }

    /// Load, mutate and immediately persist the configuration.
    pub fn update_at<F>(path: Option<&str>, mutate: F) -> Result<Self>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = Self::load_at(path)?;
        mutate(&mut config);
        config.validate()?;
        config.save_at(path)?;
        Ok(config)
    }

    /// Parsed dashboard origin
    pub fn origin_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {}", self.origin, e)).into())
    }

    /// Host part of the API base URL
    pub fn api_host(&self) -> Result<String> {
        let url = url::Url::parse(&self.api_url)
            .map_err(|e| ConfigError::Invalid(format!("api_url '{}': {}", self.api_url, e)))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| ConfigError::Invalid("api_url has no host".to_string()).into())
    }

    /// Absolute URLs of the precache manifest
    pub fn precache_urls(&self) -> Result<Vec<url::Url>> {
        let origin = self.origin_url()?;
        self.precache
            .iter()
            .map(|p| {
                origin
                    .join(p)
                    .map_err(|e| ConfigError::Invalid(format!("precache '{}': {}", p, e)).into())
            })
            .collect()
    }

    /// Require a signed-in session
    pub fn require_session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| ConfigError::MissingSession.into())
    }

    fn validate(&self) -> Result<()> {
        self.origin_url()?;
        self.api_host()?;
        Ok(())
    }
}

impl Preferences {
    /// Set a preference from its CLI name
    pub fn set(&mut self, key: &str, value: bool) -> Result<()> {
        match key {
            "dark-theme" | "dark_theme" => self.dark_theme = value,
            "twelve-hour-clock" | "twelve_hour_clock" => self.twelve_hour_clock = value,
            other => {
                return Err(ConfigError::Invalid(format!("unknown preference '{}'", other)).into());
            }
        }
        Ok(())
    }

    /// Mark a warning as seen. Returns false if it was already seen.
    pub fn mark_seen(&mut self, warning: &str) -> bool {
        self.seen_warnings.insert(warning.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn jwt_with_exp(exp: i64) -> String {
        use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        format!("header.{}.sig", payload)
    }

    fn session(token: String) -> Session {
        Session {
            token,
            user: UserSnapshot {
                id: "u1".to_string(),
                username: "alice".to_string(),
                staff: false,
            },
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.session.is_none());
        assert!(!config.preferences.dark_theme);
        assert!(config.precache.contains(&"/index.html".to_string()));
        assert_eq!(config.api_host().unwrap(), "api.example.com");
    }

    #[test]
    fn test_load_at_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config::load_at(path.to_str()).unwrap();
        assert_eq!(config.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn test_update_persists_every_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let path_str = path.to_str();

        Config::update_at(path_str, |c| c.preferences.dark_theme = true).unwrap();
        Config::update_at(path_str, |c| {
            c.preferences.mark_seen("storage-quota");
        })
        .unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert!(reloaded.preferences.dark_theme);
        assert!(reloaded.preferences.seen_warnings.contains("storage-quota"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        Config::default().save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "origin: not a url\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_precache_urls_are_absolute() {
        let config = Config {
            origin: "https://dash.test".to_string(),
            precache: vec!["/index.html".to_string(), "/dashboard".to_string()],
            ..Config::default()
        };
        let urls = config.precache_urls().unwrap();
        assert_eq!(urls[0].as_str(), "https://dash.test/index.html");
        assert_eq!(urls[1].as_str(), "https://dash.test/dashboard");
    }

    #[test]
    fn test_preferences_set() {
        let mut prefs = Preferences::default();
        prefs.set("dark-theme", true).unwrap();
        prefs.set("twelve_hour_clock", true).unwrap();
        assert!(prefs.dark_theme);
        assert!(prefs.twelve_hour_clock);
        assert!(prefs.set("font-size", true).is_err());
    }

    #[test]
    fn test_mark_seen_is_idempotent() {
        let mut prefs = Preferences::default();
        assert!(prefs.mark_seen("beta"));
        assert!(!prefs.mark_seen("beta"));
        assert_eq!(prefs.seen_warnings.len(), 1);
    }

    #[test]
    fn test_session_expiry_from_jwt() {
        let past = Utc::now().timestamp() - 3600;
        let future = Utc::now().timestamp() + 3600;

        assert!(session(jwt_with_exp(past)).is_expired());
        assert!(!session(jwt_with_exp(future)).is_expired());
        assert_eq!(
            session(jwt_with_exp(future)).expires_at().map(|d| d.timestamp()),
            Some(future)
        );
    }

    #[test]
    fn test_opaque_token_never_expires() {
        let s = session("opaque-session-token".to_string());
        assert!(s.expires_at().is_none());
        assert!(!s.is_expired());
    }
}
