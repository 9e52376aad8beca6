//! Configuration loading for Courtside clients
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`COURTSIDE_*`)
//! 3. TOML configuration file
//! 4. Compiled defaults (fallback)
//!
//! A missing TOML file is never fatal: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ENV_BASE_URL: &str = "COURTSIDE_BASE_URL";
pub const ENV_API_TOKEN: &str = "COURTSIDE_API_TOKEN";
pub const ENV_CONFIG_PATH: &str = "COURTSIDE_CONFIG";
pub const ENV_LOG_LEVEL: &str = "COURTSIDE_LOG_LEVEL";
pub const ENV_DASHBOARD_PATH: &str = "COURTSIDE_DASHBOARD_PATH";

/// Built-in defaults used when no other source provides a value
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub base_url: String,
    pub dashboard_path: String,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            dashboard_path: "/dashboard".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Configuration file contents; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    /// League API base URL, e.g. `https://league.example.org`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token for the guardian's session
    #[serde(default)]
    pub api_token: Option<String>,

    /// Path of the main dashboard, appended to `base_url` on redirect
    #[serde(default)]
    pub dashboard_path: Option<String>,

    /// Per-request timeout; absent means the HTTP client default applies
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub dashboard_path: String,
    pub request_timeout: Option<Duration>,
    pub log_level: String,
}

impl ClientConfig {
    /// Absolute URL the guardian is sent to after skipping or completing
    pub fn dashboard_url(&self) -> String {
        join_url(&self.base_url, &self.dashboard_path)
    }
}

/// Resolves [`ClientConfig`] from CLI, environment, TOML and defaults
pub struct ConfigResolver {
    overrides: ConfigOverrides,
    defaults: CompiledDefaults,
}

impl ConfigResolver {
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self {
            overrides,
            defaults: CompiledDefaults::default(),
        }
    }

    /// Resolve every setting by priority
    ///
    /// Fails only when the winning value is unusable (e.g. a base URL
    /// without an http scheme) or an explicitly requested TOML file
    /// cannot be parsed.
    pub fn resolve(&self) -> Result<ClientConfig> {
        let toml_config = self.load_toml()?;

        let base_url = first_non_blank([
            self.overrides.base_url.clone(),
            env_value(ENV_BASE_URL),
            toml_config.base_url.clone(),
        ])
        .unwrap_or_else(|| self.defaults.base_url.clone());
        validate_base_url(&base_url)?;

        let api_token = first_non_blank([
            self.overrides.api_token.clone(),
            env_value(ENV_API_TOKEN),
            toml_config.api_token.clone(),
        ]);

        let dashboard_path = first_non_blank([
            env_value(ENV_DASHBOARD_PATH),
            toml_config.dashboard_path.clone(),
        ])
        .unwrap_or_else(|| self.defaults.dashboard_path.clone());

        let log_level = first_non_blank([
            self.overrides.log_level.clone(),
            env_value(ENV_LOG_LEVEL),
            toml_config.logging.level.clone(),
        ])
        .unwrap_or_else(|| self.defaults.log_level.clone());

        let request_timeout = self
            .overrides
            .request_timeout_secs
            .or(toml_config.request_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            dashboard_path,
            request_timeout,
            log_level,
        })
    }

    fn load_toml(&self) -> Result<TomlConfig> {
        // An explicit path (CLI or env) must exist and parse
        let explicit = self
            .overrides
            .config_path
            .clone()
            .or_else(|| env_value(ENV_CONFIG_PATH).map(PathBuf::from));

        if let Some(path) = explicit {
            return read_toml_config(&path);
        }

        match default_config_path() {
            Some(path) => match read_toml_config(&path) {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Ok(TomlConfig::default())
                }
            },
            None => {
                debug!("No config file found, using defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Locate the platform configuration file, if one exists
///
/// Tries `<config dir>/courtside/config.toml` first, then
/// `/etc/courtside/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("courtside").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/courtside/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read and parse a TOML configuration file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a TOML configuration file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn validate_base_url(url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "base URL must start with http:// or https://, got {:?}",
            url
        )))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn first_non_blank<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_single_slash() {
        assert_eq!(join_url("http://a/", "/dashboard"), "http://a/dashboard");
        assert_eq!(join_url("http://a", "dashboard"), "http://a/dashboard");
    }

    #[test]
    fn test_first_non_blank_skips_empty() {
        let picked = first_non_blank([Some("  ".to_string()), None, Some("x".to_string())]);
        assert_eq!(picked.as_deref(), Some("x"));
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://league.example.org").is_ok());
        assert!(validate_base_url("league.example.org").is_err());
    }

    #[test]
    fn test_toml_config_parses_partial_file() {
        let config: TomlConfig = toml::from_str(
            r#"
            base_url = "https://league.example.org"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://league.example.org"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert!(config.api_token.is_none());
    }
}
