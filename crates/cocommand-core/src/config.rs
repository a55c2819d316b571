//! Client configuration.
//!
//! Resolution order, later wins:
//! 1. Built-in defaults
//! 2. `~/.config/cocommand/config.toml`
//! 3. Environment variables (`COCOMMAND_BASE_URL`, `COCOMMAND_TIMEOUT_MS`)
//!
//! Frontends may apply their own overrides (CLI flags) on top.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::turn::DEFAULT_TURN_LIMIT;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4840";
pub const DEFAULT_SETTINGS_COMMAND: &str = "/settings";

const ENV_BASE_URL: &str = "COCOMMAND_BASE_URL";
const ENV_TIMEOUT_MS: &str = "COCOMMAND_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot find home directory")]
    HomeDirNotFound,

    #[error("Failed to read config file at {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse config file at {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Deadline applied to every request, including streams. `None` disables it.
    pub timeout_ms: Option<u64>,
    /// How many submitted inputs and turns are kept for recall.
    pub history_limit: usize,
    /// Input that opens settings instead of reaching the backend.
    pub settings_command: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: None,
            history_limit: DEFAULT_TURN_LIMIT,
            settings_command: DEFAULT_SETTINGS_COMMAND.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// `~/.config/cocommand/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(config_dir.join("cocommand").join("config.toml"))
    }

    /// Loads from the default location, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("[ClientConfig] No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config: ClientConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        tracing::debug!("[ClientConfig] Loaded config from {:?}", path);
        Ok(config.normalized())
    }

    /// Applies overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let timeout = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_TIMEOUT_MS,
                    value: raw.clone(),
                })?;
            self.timeout_ms = (timeout > 0).then_some(timeout);
        }
        *self = std::mem::take(self).normalized();
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"http://localhost:9000/\"\ntimeout_ms = 1500\n").unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.timeout_ms, Some(1500));
        assert_eq!(config.settings_command, DEFAULT_SETTINGS_COMMAND);
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = ").unwrap();
        assert!(matches!(
            ClientConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("COCOMMAND_BASE_URL", "http://10.0.0.2:4840/"),
            ("COCOMMAND_TIMEOUT_MS", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default().with_timeout_ms(Some(10));
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.2:4840");
        assert_eq!(config.timeout_ms, None);

        let mut config = ClientConfig::default();
        let err = config
            .apply_env(|key| (key == "COCOMMAND_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
