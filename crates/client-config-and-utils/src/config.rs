//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via MEDISECURE_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("MEDISECURE_API_URL") {
    Some(url) => url,
    None => "http://localhost:8000/api",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default token refresh endpoint, relative to the API base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// How the client recovers from an expired access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Exchange the refresh token at the refresh endpoint.
    #[default]
    Endpoint,
    /// Never call the refresh endpoint; treat every expired token as a logout.
    Logout,
}

/// Bounded exponential backoff for transport-level failures.
///
/// `max_retries == 0` disables retrying entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap for the exponential delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Whether any retry will be attempted.
    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Stderr log format ("compact" or "json").
    pub log_format: String,
    /// Base URL every relative request path is joined to.
    pub api_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Refresh endpoint path, relative to `api_url`.
    pub refresh_path: String,
    /// Paths whose 401 responses never trigger the refresh protocol.
    pub auth_exempt_paths: Vec<String>,
    /// Token recovery strategy.
    pub refresh_mode: RefreshMode,
    /// Retry policy for network errors.
    pub network_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: "compact".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            auth_exempt_paths: vec!["/auth/login".to_string(), DEFAULT_REFRESH_PATH.to_string()],
            refresh_mode: RefreshMode::default(),
            network_retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| CoreError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `MEDISECURE_*` overrides from the given lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(level) = lookup("MEDISECURE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(format) = lookup("MEDISECURE_LOG_FORMAT") {
            self.log_format = format;
        }
        if let Some(url) = lookup("MEDISECURE_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = lookup("MEDISECURE_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %secs, "Ignoring invalid MEDISECURE_TIMEOUT_SECS"),
            }
        }
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.api_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::InvalidConfig {
                field: "api_url",
                reason: format!("scheme must be http or https, got {}", url.scheme()),
            });
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::InvalidConfig {
                field: "timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get the API URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(|source| CoreError::InvalidApiUrl {
            url: self.api_url.clone(),
            source,
        })
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.refresh_mode, RefreshMode::Endpoint);
        assert!(!config.network_retry.is_enabled());
        assert!(config.auth_exempt_paths.contains(&"/auth/login".to_string()));
        config.validate().unwrap();
    }

    #[test]
    fn test_config_load_from_file_partial() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "refresh_mode": "logout",
            "network_retry": { "max_retries": 3 }
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.refresh_mode, RefreshMode::Logout);
        assert_eq!(config.network_retry.max_retries, 3);
        assert_eq!(config.network_retry.initial_delay_ms, 500);
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.api_url = "https://api.example.org/api".to_string();
        config.timeout_secs = 5;
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.api_url, "https://api.example.org/api");
        assert_eq!(loaded.timeout_secs, 5);
    }

    #[test]
    fn test_config_load_nonexistent_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.refresh_path, DEFAULT_REFRESH_PATH);
    }

    #[test]
    fn test_apply_overrides() {
        let env: HashMap<&str, &str> = [
            ("MEDISECURE_API_URL", "https://clinic.example.org/api"),
            ("MEDISECURE_LOG_LEVEL", "trace"),
            ("MEDISECURE_TIMEOUT_SECS", "12"),
            ("MEDISECURE_LOG_FORMAT", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "https://clinic.example.org/api");
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.timeout_secs, 12);
        assert_eq!(config.log_format, "compact");
    }

    #[test]
    fn test_invalid_timeout_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == "MEDISECURE_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.api_url = "not a valid url".to_string();
        assert!(matches!(config.validate(), Err(CoreError::InvalidApiUrl { .. })));

        let mut config = Config::default();
        config.api_url = "ftp://files.example.org".to_string();
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig { .. })));

        let mut config = Config::default();
        config.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn test_corrupt_config_file_names_path() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), "{ \"timeout_secs\": \"thirty\" }").unwrap();

        let err = Config::load(&paths).unwrap_err();
        assert!(matches!(err, CoreError::ConfigFile { .. }));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_retry_delay_for_attempt() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(63), Duration::from_millis(1000));
    }
}
