//! User configuration
//!
//! Loaded from ~/.forge/config.toml. Every field has a default so a missing
//! file or a partial file is always usable.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{http, preview};
use crate::paths;

/// Environment variable overriding `backend_url`
pub const BACKEND_URL_ENV: &str = "FORGE_BACKEND_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Base URL of the backend REST and SSE endpoints
    pub backend_url: String,
    /// Base URL of the build socket; derived from `backend_url` when unset
    pub socket_url: Option<String>,
    pub timeouts: TimeoutConfig,
    pub preview: PreviewConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            backend_url: http::DEFAULT_BACKEND_URL.to_string(),
            socket_url: None,
            timeouts: TimeoutConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_secs: u64,
    pub default_secs: u64,
    pub extended_secs: u64,
    /// Model name fragments that select the extended deadline
    pub extended_models: Vec<String>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: http::CONNECT_TIMEOUT.as_secs(),
            default_secs: http::DEFAULT_CHAT_DEADLINE.as_secs(),
            extended_secs: http::EXTENDED_CHAT_DEADLINE.as_secs(),
            extended_models: http::EXTENDED_MODEL_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub debounce_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: preview::DEBOUNCE_WINDOW.as_millis() as u64,
        }
    }
}

impl ForgeConfig {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&paths::config_file())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ForgeConfig = toml::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save to a specific path (atomic write)
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let contents = toml::to_string_pretty(self)?;
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Apply overrides from the environment, read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|u| !u.trim().is_empty()) {
            tracing::debug!("Backend overridden from {}", BACKEND_URL_ENV);
            self.backend_url = url;
        }
    }

    /// Parsed backend base URL
    pub fn backend(&self) -> Result<Url> {
        Url::parse(&self.backend_url)
            .with_context(|| format!("Invalid backend_url '{}'", self.backend_url))
    }

    /// Parsed socket base URL, derived from the backend by swapping the scheme
    pub fn socket(&self) -> Result<Url> {
        if let Some(socket) = &self.socket_url {
            return Url::parse(socket).with_context(|| format!("Invalid socket_url '{}'", socket));
        }
        let backend = self.backend()?;
        let scheme = match backend.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => anyhow::bail!("Cannot derive a socket URL from scheme '{}'", other),
        };
        // `set_scheme` refuses special-to-special swaps it considers invalid, so rebuild
        let rest = &backend.as_str()[backend.scheme().len()..];
        Url::parse(&format!("{}{}", scheme, rest))
            .with_context(|| format!("Invalid socket URL derived from '{}'", backend))
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.preview.debounce_ms)
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            connect: Duration::from_secs(self.timeouts.connect_secs),
            default: Duration::from_secs(self.timeouts.default_secs),
            extended: Duration::from_secs(self.timeouts.extended_secs),
            extended_models: self
                .timeouts
                .extended_models
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }
}

/// Client-side deadlines for chat requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub connect: Duration,
    pub default: Duration,
    pub extended: Duration,
    extended_models: Vec<String>,
}

impl TimeoutPolicy {
    /// Deadline for a chat request against `model`
    pub fn deadline_for(&self, model: &str) -> Duration {
        let model = model.to_lowercase();
        if self
            .extended_models
            .iter()
            .any(|marker| model.contains(marker.as_str()))
        {
            self.extended
        } else {
            self.default
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        ForgeConfig::default().timeout_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ForgeConfig::load_from_path(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ForgeConfig::default());
        assert_eq!(config.debounce_window(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "backend_url = \"https://forge.example.com\"\n\n[preview]\ndebounce_ms = 120\n",
        )
        .unwrap();

        let config = ForgeConfig::load_from_path(&path).unwrap();
        assert_eq!(config.backend_url, "https://forge.example.com");
        assert_eq!(config.preview.debounce_ms, 120);
        assert_eq!(config.timeouts, TimeoutConfig::default());
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "backend_url = [").unwrap();

        let err = ForgeConfig::load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config.toml"));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ForgeConfig::default();
        config.socket_url = Some("ws://sockets:9000".into());
        config.save_to_path(&path).unwrap();

        assert_eq!(ForgeConfig::load_from_path(&path).unwrap(), config);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_env_override() {
        let mut config = ForgeConfig::default();
        config.apply_env(|key| (key == BACKEND_URL_ENV).then(|| "http://10.0.0.2:8000".to_string()));
        assert_eq!(config.backend_url, "http://10.0.0.2:8000");

        let mut config = ForgeConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config.backend_url, http::DEFAULT_BACKEND_URL);
    }

    #[test]
    fn test_socket_url_derivation() {
        let config = ForgeConfig::default();
        assert_eq!(config.socket().unwrap().as_str(), "ws://127.0.0.1:8000/");

        let config = ForgeConfig {
            backend_url: "https://forge.example.com/base/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.socket().unwrap().as_str(),
            "wss://forge.example.com/base/"
        );

        let config = ForgeConfig {
            socket_url: Some("ws://elsewhere:9001".into()),
            ..Default::default()
        };
        assert_eq!(config.socket().unwrap().host_str(), Some("elsewhere"));
    }

    #[test]
    fn test_deadline_by_model_class() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.deadline_for("gpt-4o-mini"), Duration::from_secs(60));
        assert_eq!(policy.deadline_for("deepseek-reasoner"), Duration::from_secs(300));
        assert_eq!(policy.deadline_for("O3-mini"), Duration::from_secs(300));
        assert_eq!(policy.connect, Duration::from_secs(10));
    }
}
