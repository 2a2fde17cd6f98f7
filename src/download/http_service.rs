//! reqwest-backed download service
//!
//! Files land under a single download root. `start` resolves the final file
//! name and creates the file before returning, so back-to-back uniquified
//! requests for the same path never pick the same name. The transfer itself
//! runs on its own tokio task and reports back through the event channel.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::LAST_MODIFIED;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::blob::{BLOB_SCHEME, BlobRegistry};
use super::conflict::HostConflictAction;
use super::error::DispatchError;
use super::service::{DownloadId, DownloadRequest, DownloadService, HostEvent, HostState};
use crate::file::metadata::apply_last_modified;
use crate::file::naming::{ensure_unique_path, is_absolute_path};

const RESERVE_ATTEMPTS: usize = 10;

/// Where the bytes come from
enum Source {
    Http(Url),
    Blob(Vec<u8>),
}

struct Transfer {
    path: PathBuf,
    state: HostState,
    task: Option<JoinHandle<()>>,
}

type Transfers = Arc<Mutex<HashMap<DownloadId, Transfer>>>;

fn lock(transfers: &Transfers) -> MutexGuard<'_, HashMap<DownloadId, Transfer>> {
    transfers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Record the final state and emit the stop event, once per download
fn finish(
    transfers: &Transfers,
    events: &mpsc::UnboundedSender<HostEvent>,
    id: DownloadId,
    state: HostState,
) -> bool {
    let mut map = lock(transfers);
    let Some(transfer) = map.get_mut(&id) else {
        return false;
    };
    if transfer.state != HostState::InProgress {
        return false;
    }
    transfer.state = state;
    transfer.task = None;
    if events.send(HostEvent::Changed { id, state }).is_err() {
        tracing::debug!("Event receiver dropped before download {} stopped", id);
    }
    true
}

pub struct HttpDownloadService {
    client: reqwest::Client,
    root: PathBuf,
    blobs: BlobRegistry,
    events: mpsc::UnboundedSender<HostEvent>,
    next_id: AtomicU64,
    transfers: Transfers,
}

impl HttpDownloadService {
    pub fn new(
        root: impl Into<PathBuf>,
        blobs: BlobRegistry,
        events: mpsc::UnboundedSender<HostEvent>,
    ) -> Result<Self, DispatchError> {
        Self::with_client_options(
            root,
            blobs,
            events,
            concat!("grabbag/", env!("CARGO_PKG_VERSION")),
            Duration::from_secs(300),
        )
    }

    pub fn with_client_options(
        root: impl Into<PathBuf>,
        blobs: BlobRegistry,
        events: mpsc::UnboundedSender<HostEvent>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            root: root.into(),
            blobs,
            events,
            next_id: AtomicU64::new(1),
            transfers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn resolve_source(&self, url: &str) -> Result<Source, DispatchError> {
        if url.starts_with(BLOB_SCHEME) {
            let blob = self
                .blobs
                .get(url)
                .await
                .ok_or_else(|| DispatchError::Rejected(format!("Unknown object URL '{}'", url)))?;
            return Ok(Source::Blob(blob.bytes));
        }

        let parsed = Url::parse(url).map_err(|_| DispatchError::InvalidUrl(url.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => Ok(Source::Http(parsed)),
            _ => Err(DispatchError::InvalidUrl(url.to_string())),
        }
    }

    /// Create the destination file, picking a fresh name when uniquifying
    async fn reserve(
        &self,
        target_path: &str,
        action: HostConflictAction,
    ) -> Result<(PathBuf, File), DispatchError> {
        let requested = self.root.join(target_path);
        if let Some(parent) = requested.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if action == HostConflictAction::Overwrite {
            let file = File::create(&requested).await?;
            return Ok((requested, file));
        }

        for _ in 0..RESERVE_ATTEMPTS {
            let candidate = ensure_unique_path(&requested);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    // Same millisecond as a previous pick; wait for a new suffix
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DispatchError::Rejected(format!(
            "No free file name for '{}'",
            target_path
        )))
    }

    fn state_of(&self, id: DownloadId) -> Option<HostState> {
        lock(&self.transfers).get(&id).map(|t| t.state)
    }
}

#[async_trait]
impl DownloadService for HttpDownloadService {
    async fn start(&self, request: DownloadRequest) -> Result<DownloadId, DispatchError> {
        let target_path = request.target_path.trim();
        if target_path.is_empty()
            || is_absolute_path(target_path)
            || has_parent_segment(target_path)
        {
            return Err(DispatchError::Rejected(format!(
                "Invalid target path '{}'",
                request.target_path
            )));
        }

        let source = self.resolve_source(&request.url).await?;
        let (path, file) = self.reserve(target_path, request.conflict_action).await?;
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst));

        tracing::info!("Download {} started: {} -> {:?}", id, request.url, path);

        // Register before spawning so the task can always find its entry
        lock(&self.transfers).insert(
            id,
            Transfer {
                path: path.clone(),
                state: HostState::InProgress,
                task: None,
            },
        );
        let _ = self.events.send(HostEvent::Created {
            id,
            filename: path.to_string_lossy().into_owned(),
        });

        let client = self.client.clone();
        let transfers = self.transfers.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let state = match write_source(&client, source, file, &path).await {
                Ok(bytes) => {
                    tracing::info!("Download {} complete ({} bytes)", id, bytes);
                    HostState::Complete
                }
                Err(e) => {
                    tracing::warn!("Download {} interrupted: {}", id, e);
                    HostState::Interrupted
                }
            };
            finish(&transfers, &events, id, state);
        });

        let mut map = lock(&self.transfers);
        match map.get_mut(&id) {
            Some(transfer) if transfer.state == HostState::InProgress => transfer.task = Some(task),
            _ => {}
        }
        Ok(id)
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), DispatchError> {
        let task = {
            let mut map = lock(&self.transfers);
            let transfer = map.get_mut(&id).ok_or(DispatchError::NotFound(id))?;
            if transfer.state != HostState::InProgress {
                return Err(DispatchError::Rejected(format!(
                    "Download {} already finished",
                    id
                )));
            }
            transfer.task.take()
        };

        if let Some(task) = task {
            task.abort();
        }
        finish(&self.transfers, &self.events, id, HostState::Interrupted);
        tracing::info!("Download {} cancelled", id);
        Ok(())
    }

    async fn remove_file(&self, id: DownloadId) -> Result<(), DispatchError> {
        let path = {
            let map = lock(&self.transfers);
            let transfer = map.get(&id).ok_or(DispatchError::NotFound(id))?;
            if transfer.state == HostState::InProgress {
                return Err(DispatchError::Rejected(format!(
                    "Download {} is still running",
                    id
                )));
            }
            transfer.path.clone()
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Removed {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn erase(&self, id: DownloadId) -> Result<(), DispatchError> {
        if self.state_of(id) == Some(HostState::InProgress) {
            return Err(DispatchError::Rejected(format!(
                "Download {} is still running",
                id
            )));
        }
        lock(&self.transfers)
            .remove(&id)
            .map(|_| ())
            .ok_or(DispatchError::NotFound(id))
    }
}

/// Stream `source` into `file`; returns the number of bytes written
async fn write_source(
    client: &reqwest::Client,
    source: Source,
    file: File,
    path: &Path,
) -> Result<u64, DispatchError> {
    // 64KB buffer reduces syscall overhead for fast transfers
    let mut file = BufWriter::with_capacity(64 * 1024, file);

    let (written, last_modified) = match source {
        Source::Blob(bytes) => {
            file.write_all(&bytes).await?;
            (bytes.len() as u64, None)
        }
        Source::Http(url) => {
            tracing::trace!("Sending HTTP request to {}", url);
            let response = client.get(url).send().await?.error_for_status()?;
            let last_modified = response
                .headers()
                .get(LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            (written, last_modified)
        }
    };

    file.flush().await?;
    drop(file);

    if let Err(e) = apply_last_modified(path, last_modified.as_deref()) {
        tracing::debug!("Could not set mtime on {:?}: {}", path, e);
    }
    Ok(written)
}

/// True if any `/` or `\\` separated segment is `..`
fn has_parent_segment(target_path: &str) -> bool {
    target_path.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        service: HttpDownloadService,
        events: mpsc::UnboundedReceiver<HostEvent>,
        blobs: BlobRegistry,
        dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobRegistry::new();
        let (tx, events) = mpsc::unbounded_channel();
        let service = HttpDownloadService::new(dir.path(), blobs.clone(), tx).unwrap();
        Harness {
            service,
            events,
            blobs,
            dir,
        }
    }

    fn request(url: String, target_path: &str, action: HostConflictAction) -> DownloadRequest {
        DownloadRequest {
            url,
            target_path: target_path.to_string(),
            conflict_action: action,
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<HostEvent>) -> HostEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_download_writes_file_and_reports_events() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cat.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"meow".to_vec()))
            .mount(&mock_server)
            .await;

        let mut h = harness();
        let url = format!("{}/cat.jpg", mock_server.uri());
        let id = h
            .service
            .start(request(url, "pics/cat.jpg", HostConflictAction::Uniquify))
            .await
            .unwrap();

        let HostEvent::Created { id: created, filename } = next_event(&mut h.events).await else {
            panic!("expected created event");
        };
        assert_eq!(created, id);
        assert!(filename.ends_with("cat.jpg"));

        assert_eq!(
            next_event(&mut h.events).await,
            HostEvent::Changed {
                id,
                state: HostState::Complete
            }
        );
        let content = std::fs::read(h.dir.path().join("pics").join("cat.jpg")).unwrap();
        assert_eq!(content, b"meow");
    }

    #[tokio::test]
    async fn test_http_error_interrupts() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let mut h = harness();
        let url = format!("{}/missing.jpg", mock_server.uri());
        let id = h
            .service
            .start(request(url, "missing.jpg", HostConflictAction::Uniquify))
            .await
            .unwrap();

        next_event(&mut h.events).await;
        assert_eq!(
            next_event(&mut h.events).await,
            HostEvent::Changed {
                id,
                state: HostState::Interrupted
            }
        );
    }

    #[tokio::test]
    async fn test_uniquify_picks_new_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&mock_server)
            .await;

        let mut h = harness();
        std::fs::write(h.dir.path().join("a.jpg"), b"old").unwrap();

        let url = format!("{}/a.jpg", mock_server.uri());
        h.service
            .start(request(url, "a.jpg", HostConflictAction::Uniquify))
            .await
            .unwrap();

        let HostEvent::Created { filename, .. } = next_event(&mut h.events).await else {
            panic!("expected created event");
        };
        assert!(!filename.ends_with("a.jpg"));
        next_event(&mut h.events).await;

        assert_eq!(std::fs::read(h.dir.path().join("a.jpg")).unwrap(), b"old");
        assert_eq!(std::fs::read(&filename).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_existing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&mock_server)
            .await;

        let mut h = harness();
        std::fs::write(h.dir.path().join("a.jpg"), b"old content").unwrap();

        let url = format!("{}/a.jpg", mock_server.uri());
        h.service
            .start(request(url, "a.jpg", HostConflictAction::Overwrite))
            .await
            .unwrap();
        next_event(&mut h.events).await;
        next_event(&mut h.events).await;

        assert_eq!(std::fs::read(h.dir.path().join("a.jpg")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_blob_source() {
        let mut h = harness();
        let object_url = h.blobs.materialize("data:text/plain,hi%21").await.unwrap();

        let id = h
            .service
            .start(request(object_url.clone(), "note.txt", HostConflictAction::Uniquify))
            .await
            .unwrap();
        h.blobs.release(&object_url).await;

        next_event(&mut h.events).await;
        assert_eq!(
            next_event(&mut h.events).await,
            HostEvent::Changed {
                id,
                state: HostState::Complete
            }
        );
        assert_eq!(std::fs::read(h.dir.path().join("note.txt")).unwrap(), b"hi!");
    }

    #[tokio::test]
    async fn test_cancel_then_remove_and_erase() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&mock_server)
            .await;

        let mut h = harness();
        let url = format!("{}/slow.bin", mock_server.uri());
        let id = h
            .service
            .start(request(url, "slow.bin", HostConflictAction::Uniquify))
            .await
            .unwrap();
        next_event(&mut h.events).await;

        assert!(matches!(
            h.service.remove_file(id).await,
            Err(DispatchError::Rejected(_))
        ));

        h.service.cancel(id).await.unwrap();
        assert_eq!(
            next_event(&mut h.events).await,
            HostEvent::Changed {
                id,
                state: HostState::Interrupted
            }
        );
        assert!(h.service.cancel(id).await.is_err());

        h.service.remove_file(id).await.unwrap();
        assert!(!h.dir.path().join("slow.bin").exists());

        h.service.erase(id).await.unwrap();
        assert!(matches!(
            h.service.erase(id).await,
            Err(DispatchError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let h = harness();
        for (url, target) in [
            ("https://example.com/a.jpg", "/etc/passwd"),
            ("https://example.com/a.jpg", ""),
            ("ftp://example.com/a.jpg", "a.jpg"),
            ("blob:grabbag/unknown", "a.jpg"),
        ] {
            let result = h
                .service
                .start(request(url.to_string(), target, HostConflictAction::Uniquify))
                .await;
            assert!(result.is_err(), "{} -> {} should be rejected", url, target);
        }
        assert!(std::fs::read_dir(h.dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_rejects_parent_segments() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let (tx, _events) = mpsc::unbounded_channel();
        let service = HttpDownloadService::new(&root, BlobRegistry::new(), tx).unwrap();

        for target in ["../evil.sh", "pics/../../evil.sh", "..\\evil.sh", ".."] {
            let result = service
                .start(request(
                    "https://example.com/a.jpg".to_string(),
                    target,
                    HostConflictAction::Overwrite,
                ))
                .await;
            assert!(
                matches!(result, Err(DispatchError::Rejected(_))),
                "{} should be rejected",
                target
            );
        }
        assert!(!dir.path().join("evil.sh").exists());
        assert!(!dir.path().join("root").join("pics").exists());

        assert!(!has_parent_segment("_./_./evil.sh"));
        assert!(!has_parent_segment("a..b/c..jpg"));
    }
}
