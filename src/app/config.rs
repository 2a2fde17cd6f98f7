use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::settings::Settings;

/// Complete configuration (saved to config/settings.toml)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download root; target paths are resolved against it
    #[serde(default = "crate::util::paths::default_download_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_user_agent() -> String {
    format!("grabbag/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: crate::util::paths::default_download_directory(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from the config directory, falling back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let config_path = crate::util::paths::settings_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            tracing::info!("Config not found at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .context(format!("Failed to read {:?}", config_path))?;
        let config: Config =
            toml::from_str(&content).context(format!("Failed to parse {:?}", config_path))?;
        config
            .settings
            .validate()
            .context(format!("Invalid settings in {:?}", config_path))?;

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = crate::util::paths::settings_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        self.settings
            .validate()
            .context("Cannot save invalid settings")?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;

        // Atomic write using temp file + rename
        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).context("Failed to write temp config file")?;
        std::fs::rename(&temp_path, config_path).context("Failed to rename temp config file")?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.download.request_timeout_secs)
    }
}
