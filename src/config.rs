//! Configuration file support for agensight
//!
//! Reads from .agensight/config.toml (searched upward from the current
//! directory). `AGENSIGHT_API_URL` overrides the backend base URL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".agensight";
pub const API_URL_ENV: &str = "AGENSIGHT_API_URL";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Backend API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Proxy server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Timeline rendering settings
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the backend (no trailing slash needed)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Port for `agensight serve`
    /// Default: 3000
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimelineConfig {
    /// Smallest bar width as a fraction of the axis
    #[serde(default = "default_min_width")]
    pub min_width_fraction: f64,

    /// Extra name → "#rrggbb" entries layered over the built-in palette
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

fn default_min_width() -> f64 {
    crate::timeline::DEFAULT_MIN_WIDTH
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_width_fraction: default_min_width(),
            colors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct LogConfig {
    /// Default filter when neither AGENSIGHT_LOG nor -v is given (e.g. "info")
    #[serde(default)]
    pub level: Option<String>,

    /// Log file used while the dashboard owns the terminal
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load config from .agensight/config.toml, then apply env overrides
    /// Returns default config if file doesn't exist
    pub fn load() -> Self {
        let mut config = Self::find_config_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url.trim().to_string();
            }
        }
        config
    }

    /// Parse a specific config file
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| crate::StudioError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(CONFIG_DIR).join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Where dashboard logs go when no file is configured
    pub fn log_file(&self) -> PathBuf {
        self.log
            .file
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("studio.log"))
    }

    /// Timeline builder configured from the `[timeline]` section
    pub fn timeline_builder(&self) -> crate::timeline::TimelineBuilder {
        crate::timeline::TimelineBuilder::new()
            .with_min_width(self.timeline.min_width_fraction)
            .with_colors(self.timeline.colors.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.server.port, 3000);
        assert!(config.timeline.colors.is_empty());
        assert_eq!(config.log_file(), PathBuf::from(".agensight/studio.log"));
    }

    #[test]
    fn test_parse_config() {
        let toml = r##"
[api]
base_url = "http://localhost:5001"

[timeline]
min_width_fraction = 0.01
colors = { planner = "#123456" }

[log]
level = "debug"
"##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5001");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.timeline.colors["planner"], "#123456");
        assert_eq!(config.log.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_from_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, crate::StudioError::Config(_)));
    }
}
