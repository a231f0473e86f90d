//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 arrive together as [`ConfigOverrides`] (the binary's clap
//! parser reads both). A missing TOML file is not an error: the service logs a
//! warning and starts on defaults. A malformed one is.

use crate::goal::{
    GoalTracker, DEFAULT_GOAL_STEP, DEFAULT_INITIAL_GOAL, DEFAULT_INITIAL_PREVIOUS_GOAL,
};
use crate::{time, Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 90_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Config file contents. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub poll_interval_ms: Option<u64>,
    pub goal: GoalSection,
    pub oauth: OAuthSection,
    pub api: ApiSection,
    pub logging: LoggingConfig,
}

/// `[goal]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GoalSection {
    pub step: Option<u64>,
    pub initial: Option<u64>,
    pub initial_previous: Option<u64>,
}

/// `[oauth]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OAuthSection {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
}

/// `[api]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSection {
    pub base_url: Option<String>,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub poll_interval_ms: Option<u64>,
    pub goal_step: Option<u64>,
    pub initial_goal: Option<u64>,
    pub initial_previous_goal: Option<u64>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub log_level: Option<String>,
}

/// OAuth client settings for the identity provider
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    /// Empty when no client has been configured
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl OAuthSettings {
    /// True when a client id is present
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    /// Initial goal state including the step
    pub goal: GoalTracker,
    pub oauth: OAuthSettings,
    pub api_base_url: String,
    pub log_level: String,
}

impl ServiceConfig {
    /// Merge overrides, file values and defaults, then validate
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig) -> Result<Self> {
        let host = overrides
            .host
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides.port.or(file.port).unwrap_or(DEFAULT_PORT);

        let poll_interval_ms = overrides
            .poll_interval_ms
            .or(file.poll_interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        if poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be greater than zero".to_string()));
        }

        let step = overrides
            .goal_step
            .or(file.goal.step)
            .unwrap_or(DEFAULT_GOAL_STEP);
        let initial_goal = overrides
            .initial_goal
            .or(file.goal.initial)
            .unwrap_or(DEFAULT_INITIAL_GOAL);
        let initial_previous = overrides
            .initial_previous_goal
            .or(file.goal.initial_previous)
            .unwrap_or(DEFAULT_INITIAL_PREVIOUS_GOAL);
        let goal = GoalTracker::new(step, initial_goal, initial_previous)
            .map_err(|e| Error::Config(e.to_string()))?;

        let redirect_uri = overrides
            .redirect_uri
            .or(file.oauth.redirect_uri)
            .unwrap_or_else(|| format!("http://localhost:{}/oauth2callback", port));

        let oauth = OAuthSettings {
            client_id: overrides
                .client_id
                .or(file.oauth.client_id)
                .unwrap_or_default(),
            client_secret: overrides
                .client_secret
                .or(file.oauth.client_secret)
                .filter(|s| !s.is_empty()),
            redirect_uri,
            auth_url: file
                .oauth
                .auth_url
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            token_url: file
                .oauth
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            scopes: vec![YOUTUBE_READONLY_SCOPE.to_string()],
        };

        let api_base_url = file
            .api
            .base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let log_level = overrides
            .log_level
            .or(file.logging.level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            host,
            port,
            poll_interval: time::millis_to_duration(poll_interval_ms),
            goal,
            oauth,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            log_level,
        })
    }

    /// Address viewers and the admin use to reach this server
    pub fn public_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

/// Platform config file location (`<config dir>/subcount/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("subcount").join("config.toml"))
}

/// Pick the config file: explicit path first, then the platform default if it exists
///
/// An explicitly named file that does not exist is an error; a missing
/// platform default just means no file.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }
    Ok(default_config_path().filter(|p| p.exists()))
}

/// Load the TOML config file
///
/// A missing file yields defaults with a warning. Read or parse errors are returned.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_supplied() {
        let config = ServiceConfig::resolve(ConfigOverrides::default(), TomlConfig::default()).unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.poll_interval, Duration::from_millis(90_000));
        assert_eq!(config.goal, GoalTracker::default());
        assert_eq!(config.oauth.redirect_uri, "http://localhost:3000/oauth2callback");
        assert_eq!(config.oauth.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.log_level, "info");
        assert!(!config.oauth.is_configured());
    }

    #[test]
    fn test_overrides_beat_file_values() {
        let file: TomlConfig = toml::from_str(
            r#"
            port = 4000
            poll_interval_ms = 30000

            [goal]
            step = 100
            initial = 1000
            initial_previous = 900
            "#,
        )
        .unwrap();
        let overrides = ConfigOverrides {
            port: Some(5000),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(overrides, file).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.goal.step(), 100);
        assert_eq!(config.goal.goal(), 1000);
        assert_eq!(config.goal.previous_goal(), 900);
        assert_eq!(config.oauth.redirect_uri, "http://localhost:5000/oauth2callback");
    }

    #[test]
    fn test_invalid_goal_rejected() {
        let overrides = ConfigOverrides {
            goal_step: Some(10),
            initial_goal: Some(815),
            ..Default::default()
        };
        let err = ServiceConfig::resolve(overrides, TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let overrides = ConfigOverrides {
            poll_interval_ms: Some(0),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(overrides, TomlConfig::default()).is_err());
    }

    #[test]
    fn test_empty_client_secret_treated_as_absent() {
        let overrides = ConfigOverrides {
            client_id: Some("abc.apps.googleusercontent.com".to_string()),
            client_secret: Some(String::new()),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(overrides, TomlConfig::default()).unwrap();
        assert!(config.oauth.is_configured());
        assert!(config.oauth.client_secret.is_none());
    }

    #[test]
    fn test_api_base_url_trailing_slash_trimmed() {
        let file: TomlConfig = toml::from_str("[api]\nbase_url = \"http://127.0.0.1:9999/\"\n").unwrap();
        let config = ServiceConfig::resolve(ConfigOverrides::default(), file).unwrap();
        assert_eq!(config.api_base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_public_url() {
        let overrides = ConfigOverrides {
            port: Some(8080),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(overrides, TomlConfig::default()).unwrap();
        assert_eq!(config.public_url(), "http://localhost:8080");
    }
}
