use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::watch;

/// How long finished downloads are remembered for duplicate detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepHistory {
    Never,
    /// Only for the lifetime of the process
    Session,
    #[default]
    Always,
}

impl fmt::Display for KeepHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeepHistory::Never => "never",
            KeepHistory::Session => "session",
            KeepHistory::Always => "always",
        })
    }
}

impl FromStr for KeepHistory {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(KeepHistory::Never),
            "session" => Ok(KeepHistory::Session),
            "always" => Ok(KeepHistory::Always),
            _ => Err(SettingsError::InvalidValue {
                key: "keep_history".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for setting '{key}'")]
    InvalidValue { key: String, value: String },

    #[error("Setting '{key}' must be at least {min}")]
    OutOfRange { key: String, min: usize },
}

/// Queue behavior settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_concurrent_downloads: usize,
    pub keep_history: KeepHistory,
    /// Maximum number of history entries kept
    pub max_history: usize,
    /// Maximum number of finished items kept in the queue
    pub max_queue_done: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 4,
            keep_history: KeepHistory::Always,
            max_history: 1000,
            max_queue_done: 1000,
        }
    }
}

impl Settings {
    pub const KEYS: [&'static str; 4] = [
        "max_concurrent_downloads",
        "keep_history",
        "max_history",
        "max_queue_done",
    ];

    pub fn get(&self, key: &str) -> Result<String, SettingsError> {
        Ok(match key {
            "max_concurrent_downloads" => self.max_concurrent_downloads.to_string(),
            "keep_history" => self.keep_history.to_string(),
            "max_history" => self.max_history.to_string(),
            "max_queue_done" => self.max_queue_done.to_string(),
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        })
    }

    /// Parse and assign `value` to the setting named `key`
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let parse_count = |min: usize| -> Result<usize, SettingsError> {
            let n: usize = value.trim().parse().map_err(|_| SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            if n < min {
                return Err(SettingsError::OutOfRange {
                    key: key.to_string(),
                    min,
                });
            }
            Ok(n)
        };

        match key {
            "max_concurrent_downloads" => self.max_concurrent_downloads = parse_count(1)?,
            "keep_history" => self.keep_history = value.parse()?,
            "max_history" => self.max_history = parse_count(0)?,
            "max_queue_done" => self.max_queue_done = parse_count(0)?,
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_concurrent_downloads == 0 {
            return Err(SettingsError::OutOfRange {
                key: "max_concurrent_downloads".to_string(),
                min: 1,
            });
        }
        Ok(())
    }
}

/// Live settings shared with the orchestrator
///
/// Every change is broadcast to subscribers. Persisting is the caller's job
/// (see [`crate::app::config::Config::save`]).
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx }
    }

    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Set one key; subscribers are notified only if the value changed
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut next = self.current();
        next.set(key, value)?;
        self.replace(next);
        Ok(())
    }

    pub fn replace(&self, settings: Settings) {
        self.tx.send_if_modified(|current| {
            if *current == settings {
                return false;
            }
            tracing::info!("Settings changed: {:?}", settings);
            *current = settings;
            true
        });
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
