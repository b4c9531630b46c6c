use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_URL_ENV: &str = "THREAT_AI_API_URL";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the threat-intelligence service
    pub api_base_url: String,

    /// Client-side request timeout; `None` leaves it to the service
    pub request_timeout_secs: Option<u64>,

    /// Quiet window before a history search goes out
    pub history_debounce_ms: u64,

    /// Where exported reports are written
    pub download_dir: Option<PathBuf>,

    pub logging: LoggingConfig,

    /// ~/.threat-ai, never read from the file
    #[serde(skip)]
    pub home: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Defaults to <home>/logs
    pub dir: Option<PathBuf>,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            format: "text".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: None,
            history_debounce_ms: 300,
            download_dir: None,
            logging: LoggingConfig::default(),
            home: home.join(".threat-ai"),
        }
    }
}

impl Config {
    /// Load ~/.threat-ai/config.toml, then apply environment overrides
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let mut config = Self::load_from(&home.join(".threat-ai"))?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit app directory, creating it if needed
    pub fn load_from(app_home: &Path) -> Result<Self> {
        let config_path = app_home.join("config.toml");

        fs::create_dir_all(app_home).context("Failed to create .threat-ai directory")?;

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home = app_home.to_path_buf();
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    /// Explicit directory, then the OS downloads folder, then ~/.threat-ai/downloads
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| self.home.join("downloads"))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| self.home.join("logs"))
    }

    pub fn history_debounce(&self) -> Duration {
        Duration::from_millis(self.history_debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
