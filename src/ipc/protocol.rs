//! Messages exchanged between a UI front-end and the queue service.
//!
//! Wire format: each message is a single JSON line terminated by `\n`,
//! tagged by its `topic` field.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::download::{DownloadOptions, QueueSnapshot, QueueSummary};
use crate::media::{MediaItem, RawMedia};

/// Request sent from the UI
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum UiRequest {
    /// Current queue contents
    GetQueue,

    /// Drop every queue item
    ClearQueue,

    /// Normalize scraper records into media items
    PrepareMedia { records: Vec<RawMedia> },

    /// Enqueue items, optionally renaming them with a naming mask first
    DownloadMediaItems {
        #[serde(default)]
        options: DownloadOptions,
        media_items: Vec<MediaItem>,
        #[serde(default)]
        naming_mask: Option<String>,
    },
}

/// Message sent to the UI, either a response or a pushed update
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum UiMessage {
    Queue(QueueSnapshot),

    Media { items: Vec<MediaItem> },

    /// Items were queued under these ids
    Accepted { ids: Vec<Uuid> },

    Error { message: String },

    /// Pushed whenever the queue summary changes
    Summary(QueueSummary),
}

impl UiMessage {
    pub fn error(message: impl Into<String>) -> Self {
        UiMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ConflictAction;
    use serde_json::json;

    #[test]
    fn test_parse_simple_topics() {
        let request: UiRequest = serde_json::from_str(r#"{"topic":"get_queue"}"#).unwrap();
        assert!(matches!(request, UiRequest::GetQueue));
        let request: UiRequest = serde_json::from_str(r#"{"topic":"clear_queue"}"#).unwrap();
        assert!(matches!(request, UiRequest::ClearQueue));
    }

    #[test]
    fn test_parse_download_request() {
        let item = serde_json::to_value(MediaItem::from_url("https://example.com/a.jpg").unwrap())
            .unwrap();
        let raw = json!({
            "topic": "download_media_items",
            "options": {"download_path": "pics", "conflict_action": "skip"},
            "media_items": [item],
            "naming_mask": "${inum}.${ext}"
        });

        let UiRequest::DownloadMediaItems {
            options,
            media_items,
            naming_mask,
        } = serde_json::from_value(raw).unwrap()
        else {
            panic!("expected download request");
        };
        assert_eq!(options.conflict_action, ConflictAction::Skip);
        assert_eq!(media_items.len(), 1);
        assert_eq!(naming_mask.as_deref(), Some("${inum}.${ext}"));
    }

    #[test]
    fn test_unknown_topic_is_error() {
        assert!(serde_json::from_str::<UiRequest>(r#"{"topic":"explode"}"#).is_err());
    }

    #[test]
    fn test_serialize_messages() {
        let summary = UiMessage::Summary(QueueSummary {
            pending: 1,
            total: 2,
            concurrent: 1,
        });
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({"topic": "summary", "pending": 1, "total": 2, "concurrent": 1})
        );

        let line = UiMessage::error("nope").to_line().unwrap();
        assert_eq!(line, "{\"topic\":\"error\",\"message\":\"nope\"}\n");
    }
}
