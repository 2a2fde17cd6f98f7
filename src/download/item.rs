use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::conflict::ConflictAction;
use super::service::DownloadId;
use crate::file::naming::{
    is_absolute_path, join_target_path, sanitize_directory_path, sanitize_path,
};
use crate::media::MediaItem;

/// Log entry for queue item events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Log level for entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Lifecycle of a queue item
///
/// ```text
/// new -> selecting -> in_progress -> completed | interrupted | skipped
///        selecting -> skipped | failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Waiting for a free slot
    New,
    /// Picked by the scheduler, dispatch pending
    Selecting,
    InProgress,
    Completed,
    Interrupted,
    Failed,
    Skipped,
}

impl QueueState {
    /// Completed, interrupted, failed or skipped
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueState::Completed | QueueState::Interrupted | QueueState::Failed | QueueState::Skipped
        )
    }

    pub fn can_transition_to(self, next: QueueState) -> bool {
        use QueueState::*;
        matches!(
            (self, next),
            (New, Selecting)
                | (Selecting, InProgress)
                | (Selecting, Skipped)
                | (Selecting, Failed)
                | (InProgress, Completed)
                | (InProgress, Interrupted)
                | (InProgress, Skipped)
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Download path must be relative: '{0}'")]
    AbsolutePath(String),
}

/// Per-enqueue download options chosen by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Directory relative to the download root, `/` separated
    #[serde(default)]
    pub download_path: String,
    #[serde(default)]
    pub conflict_action: ConflictAction,
    /// Remove the service's record of the download once it stops
    #[serde(default)]
    pub erase_history: bool,
}

impl DownloadOptions {
    /// Reject absolute download paths and sanitize each path component.
    pub fn validated(mut self) -> Result<Self, OptionsError> {
        if is_absolute_path(&self.download_path) {
            return Err(OptionsError::AbsolutePath(self.download_path));
        }
        self.download_path = sanitize_directory_path(&self.download_path);
        Ok(self)
    }
}

/// One media item scheduled for download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub options: DownloadOptions,
    pub media: MediaItem,
    pub state: QueueState,
    pub download_id: Option<DownloadId>,
    /// `download_path/output_filename`, fixed at construction
    pub target_path: String,
    pub start: Option<DateTime<Utc>>,
    pub finish: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub skip_reason: Option<super::conflict::SkipReason>,
    /// Materialized blob reference for data: URLs, held while the download runs
    #[serde(skip)]
    pub object_url: Option<String>,
    pub logs: Vec<LogEntry>,
}

/// Output filename as a sanitized path relative to the download path
fn relative_filename(media: &MediaItem) -> String {
    let name = sanitize_path(&media.output_filename());
    let name = name.trim_start_matches('/');
    if name.is_empty() {
        sanitize_path(&media.full_filename())
    } else {
        name.to_string()
    }
}

impl QueueItem {
    pub fn new(media: MediaItem, options: DownloadOptions) -> Self {
        let filename = relative_filename(&media);
        let target_path = join_target_path([options.download_path.as_str(), filename.as_str()]);

        let mut item = Self {
            id: Uuid::new_v4(),
            options,
            media,
            state: QueueState::New,
            download_id: None,
            target_path,
            start: None,
            finish: None,
            error: None,
            skip_reason: None,
            object_url: None,
            logs: Vec::new(),
        };
        item.log_info(format!("Queued as '{}'", item.target_path));
        item
    }

    pub fn url(&self) -> &str {
        self.media.url.as_str()
    }

    /// File name part of `target_path`, without the download path
    pub fn output_filename(&self) -> String {
        relative_filename(&self.media)
    }

    pub fn is_new(&self) -> bool {
        self.state == QueueState::New
    }

    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// True while the download service still owes a stop event for this item
    pub fn awaiting_stop(&self) -> bool {
        self.download_id.is_some() && self.finish.is_none()
    }

    /// Move to `next` if the state machine allows it. Refused moves are logged and ignored.
    pub fn transition(&mut self, next: QueueState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "Refusing queue item {} transition {:?} -> {:?}",
                self.id,
                self.state,
                next
            );
            self.log_warn(format!("Refused transition {:?} -> {:?}", self.state, next));
            return false;
        }
        tracing::debug!("Queue item {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        true
    }

    /// Add an info log entry
    pub fn log_info(&mut self, message: String) {
        self.logs.push(LogEntry::info(message));
    }

    /// Add a warning log entry
    pub fn log_warn(&mut self, message: String) {
        self.logs.push(LogEntry::warn(message));
    }

    /// Add an error log entry
    pub fn log_error(&mut self, message: String) {
        self.logs.push(LogEntry::error(message));
    }

    /// Duration between start and finish, if both are known
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.finish? - self.start?)
    }
}
