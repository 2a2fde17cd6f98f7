#![allow(dead_code)]

use async_trait::async_trait;
use grabbag::app::settings::{Settings, SettingsStore};
use grabbag::download::{
    BlobRegistry, DispatchError, DownloadHistory, DownloadId, DownloadRequest, DownloadService,
    HistoryEntry, HistoryStore, HostEvent, HostState, MemoryHistoryStore, Orchestrator,
    PersistenceError, QueueState,
};
use grabbag::media::MediaItem;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Download service that records every call and never touches the network
#[derive(Default)]
pub struct MockDownloadService {
    next_id: AtomicU64,
    rejected: Mutex<HashSet<String>>,
    pub started: Mutex<Vec<DownloadRequest>>,
    pub cancelled: Mutex<Vec<DownloadId>>,
    pub removed: Mutex<Vec<DownloadId>>,
    pub erased: Mutex<Vec<DownloadId>>,
}

impl MockDownloadService {
    /// Make `start` refuse this URL
    pub fn reject(&self, url: &str) {
        self.rejected.lock().unwrap().insert(url.to_string());
    }

    pub fn started_paths(&self) -> Vec<String> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.target_path.clone())
            .collect()
    }

    pub fn started_urls(&self) -> Vec<String> {
        self.started.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl DownloadService for MockDownloadService {
    async fn start(&self, request: DownloadRequest) -> Result<DownloadId, DispatchError> {
        if self.rejected.lock().unwrap().contains(&request.url) {
            return Err(DispatchError::Rejected(format!("{} is blocked", request.url)));
        }
        self.started.lock().unwrap().push(request);
        Ok(DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), DispatchError> {
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }

    async fn remove_file(&self, id: DownloadId) -> Result<(), DispatchError> {
        self.removed.lock().unwrap().push(id);
        Ok(())
    }

    async fn erase(&self, id: DownloadId) -> Result<(), DispatchError> {
        self.erased.lock().unwrap().push(id);
        Ok(())
    }
}

/// An orchestrator wired to a mock service and in-memory history
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub service: Arc<MockDownloadService>,
    pub history: Arc<MemoryHistoryStore>,
    pub blobs: BlobRegistry,
    pub settings: SettingsStore,
}

pub fn harness(settings: Settings) -> Harness {
    let service = Arc::new(MockDownloadService::default());
    let history = Arc::new(MemoryHistoryStore::new());
    let blobs = BlobRegistry::new();
    let settings = SettingsStore::new(settings);
    let orchestrator = Orchestrator::new(
        service.clone(),
        history.clone(),
        blobs.clone(),
        settings.subscribe(),
    );
    Harness {
        orchestrator,
        service,
        history,
        blobs,
        settings,
    }
}

/// History store whose every read and write fails, counting the attempts
#[derive(Default)]
pub struct FailingHistoryStore {
    pub lookups: AtomicU64,
    pub appends: AtomicU64,
}

fn unavailable() -> PersistenceError {
    PersistenceError::Io(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "history unavailable",
    ))
}

#[async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn load(&self) -> Result<DownloadHistory, PersistenceError> {
        Err(unavailable())
    }

    async fn save(&self, _history: &DownloadHistory) -> Result<(), PersistenceError> {
        Err(unavailable())
    }

    async fn contains(&self, _url: &str, _path: &str) -> Result<bool, PersistenceError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Err(unavailable())
    }

    async fn append(&self, _entry: HistoryEntry, _max: usize) -> Result<(), PersistenceError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(unavailable())
    }
}

/// An orchestrator whose persistent history always fails
pub struct FailingHistoryHarness {
    pub orchestrator: Orchestrator,
    pub service: Arc<MockDownloadService>,
    pub history: Arc<FailingHistoryStore>,
    pub settings: SettingsStore,
}

pub fn failing_history_harness(settings: Settings) -> FailingHistoryHarness {
    let service = Arc::new(MockDownloadService::default());
    let history = Arc::new(FailingHistoryStore::default());
    let settings = SettingsStore::new(settings);
    let orchestrator = Orchestrator::new(
        service.clone(),
        history.clone(),
        BlobRegistry::new(),
        settings.subscribe(),
    );
    FailingHistoryHarness {
        orchestrator,
        service,
        history,
        settings,
    }
}

/// Settings with the given concurrency ceiling, everything else default
pub fn settings_with_ceiling(max: usize) -> Settings {
    Settings {
        max_concurrent_downloads: max,
        ..Settings::default()
    }
}

pub fn media(url: &str) -> MediaItem {
    MediaItem::from_url(url).unwrap()
}

pub fn media_items(urls: &[&str]) -> Vec<MediaItem> {
    urls.iter().map(|u| media(u)).collect()
}

pub fn states(orchestrator: &Orchestrator) -> Vec<QueueState> {
    orchestrator.queue().iter().map(|i| i.state).collect()
}

pub fn complete(id: u64) -> HostEvent {
    HostEvent::Changed {
        id: DownloadId(id),
        state: HostState::Complete,
    }
}

pub fn interrupted(id: u64) -> HostEvent {
    HostEvent::Changed {
        id: DownloadId(id),
        state: HostState::Interrupted,
    }
}

pub fn created(id: u64, filename: &str) -> HostEvent {
    HostEvent::Created {
        id: DownloadId(id),
        filename: filename.to_string(),
    }
}

/// Mock server answering GET `file_path` with `content`
pub async fn setup_mock_file_server(file_path: &str, content: Vec<u8>) -> (MockServer, String) {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.clone())
                .append_header("Content-Length", content.len().to_string()),
        )
        .mount(&server)
        .await;

    (server, uri)
}

/// Generate deterministic test content
pub fn generate_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
