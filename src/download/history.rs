//! Download history
//!
//! A bounded, newest-first list of `{url, path}` pairs used to skip URLs that
//! were already saved to the same place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::error::PersistenceError;

/// One finished download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    /// Target path relative to the download root
    pub path: String,
}

impl HistoryEntry {
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
        }
    }
}

/// History storage, newest entry first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadHistory {
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

impl DownloadHistory {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert at the front and cut the list down to `max` entries
    pub fn record(&mut self, entry: HistoryEntry, max: usize) {
        self.entries.insert(0, entry);
        self.entries.truncate(max);
    }

    pub fn contains(&self, url: &str, path: &str) -> bool {
        self.entries.iter().any(|e| e.url == url && e.path == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Where the history lives between runs
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self) -> Result<DownloadHistory, PersistenceError>;

    async fn save(&self, history: &DownloadHistory) -> Result<(), PersistenceError>;

    async fn contains(&self, url: &str, path: &str) -> Result<bool, PersistenceError> {
        Ok(self.load().await?.contains(url, path))
    }

    async fn append(&self, entry: HistoryEntry, max: usize) -> Result<(), PersistenceError> {
        let mut history = self.load().await?;
        history.record(entry, max);
        self.save(&history).await
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        self.save(&DownloadHistory::new()).await
    }
}

/// History kept only for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    history: Mutex<DownloadHistory>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> Result<DownloadHistory, PersistenceError> {
        Ok(self.history.lock().await.clone())
    }

    async fn save(&self, history: &DownloadHistory) -> Result<(), PersistenceError> {
        *self.history.lock().await = history.clone();
        Ok(())
    }

    async fn contains(&self, url: &str, path: &str) -> Result<bool, PersistenceError> {
        Ok(self.history.lock().await.contains(url, path))
    }

    async fn append(&self, entry: HistoryEntry, max: usize) -> Result<(), PersistenceError> {
        self.history.lock().await.record(entry, max);
        Ok(())
    }
}

/// History persisted as TOML
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<DownloadHistory, PersistenceError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(DownloadHistory::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(toml::from_str(&content)?)
    }

    async fn write(&self, history: &DownloadHistory) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(history)?;

        // Atomic write: temp file + rename
        let temp_path = self.path.with_extension("toml.tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        tracing::debug!(
            "Saved {} history entries to {}",
            history.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self) -> Result<DownloadHistory, PersistenceError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn save(&self, history: &DownloadHistory) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        self.write(history).await
    }

    async fn append(&self, entry: HistoryEntry, max: usize) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        let mut history = self.read().await?;
        history.record(entry, max);
        self.write(&history).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_new() {
        let history = DownloadHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_record_is_newest_first_and_bounded() {
        let mut history = DownloadHistory::new();
        history.record(HistoryEntry::new("u1", "p1"), 2);
        history.record(HistoryEntry::new("u2", "p2"), 2);
        history.record(HistoryEntry::new("u3", "p3"), 2);

        assert_eq!(
            history.entries,
            vec![HistoryEntry::new("u3", "p3"), HistoryEntry::new("u2", "p2")]
        );
    }

    #[test]
    fn test_contains_requires_url_and_path() {
        let mut history = DownloadHistory::new();
        history.record(HistoryEntry::new("http://a/x.jpg", "x.jpg"), 10);

        assert!(history.contains("http://a/x.jpg", "x.jpg"));
        assert!(!history.contains("http://a/x.jpg", "other/x.jpg"));
        assert!(!history.contains("http://b/x.jpg", "x.jpg"));
    }

    #[tokio::test]
    async fn test_memory_store_append_and_clear() {
        let store = MemoryHistoryStore::new();
        store.append(HistoryEntry::new("u", "p"), 5).await.unwrap();
        assert!(store.contains("u", "p").await.unwrap());

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(temp_dir.path().join("history.toml"));
        assert!(store.load().await.unwrap().is_empty());
        assert!(!store.contains("u", "p").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("history.toml");
        let store = FileHistoryStore::new(&path);

        store.append(HistoryEntry::new("u1", "a/1.jpg"), 10).await.unwrap();
        store.append(HistoryEntry::new("u2", "a/2.jpg"), 10).await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        let reopened = FileHistoryStore::new(&path);
        let history = reopened.load().await.unwrap();
        assert_eq!(history.entries[0], HistoryEntry::new("u2", "a/2.jpg"));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.toml");
        std::fs::write(&path, "entries = [[[").unwrap();

        let store = FileHistoryStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(PersistenceError::Parse(_))
        ));
    }
}
