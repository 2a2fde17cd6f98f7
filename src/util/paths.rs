//! Where grabbag keeps its files.
//!
//! The config directory is the first of: the `--config` override,
//! `$GRABBAG_CONFIG_DIR`, `<user config dir>/grabbag`. It is created on first
//! use and holds `settings.toml`, `history.toml` and the `.logs` directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub const CONFIG_DIR_ENV: &str = "GRABBAG_CONFIG_DIR";

const SETTINGS_FILE: &str = "settings.toml";
const HISTORY_FILE: &str = "history.toml";
const LOGS_DIR: &str = ".logs";

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Which rule picked the config directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Environment,
    UserDir,
}

/// Set by `--config`; `None` restores the normal lookup
pub fn set_config_dir_override(path: Option<PathBuf>) {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = path;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Pick the config directory without touching the filesystem
pub fn locate_config_dir() -> Result<(PathBuf, ConfigSource)> {
    if let Some(path) = config_dir_override() {
        return Ok((path, ConfigSource::Override));
    }

    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(value) if !value.is_empty() => {
            return Ok((PathBuf::from(value), ConfigSource::Environment));
        }
        _ => {}
    }

    let base = dirs::config_dir().context("Could not determine user config directory")?;
    Ok((base.join("grabbag"), ConfigSource::UserDir))
}

/// The config directory, created if missing
pub fn config_dir() -> Result<PathBuf> {
    let (dir, source) = locate_config_dir()?;
    std::fs::create_dir_all(&dir)
        .context(format!("Failed to create config directory {:?}", dir))?;
    tracing::debug!("Using config directory {:?} ({:?})", dir, source);
    Ok(dir)
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

pub fn history_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(HISTORY_FILE))
}

pub fn logs_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join(LOGS_DIR))
}

/// `Downloads` under the working directory
pub fn default_download_directory() -> PathBuf {
    std::env::current_dir()
        .map(|cwd| cwd.join("Downloads"))
        .unwrap_or_else(|_| PathBuf::from("Downloads"))
}

/// Configured download root; a relative path is taken from the config directory
pub fn resolve_download_root(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(config_dir()?.join(path))
}
