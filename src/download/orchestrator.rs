//! Queue orchestrator
//!
//! A single task owns the queue and the concurrency counter. Host events, UI
//! requests, settings changes and the badge timer all arrive through
//! channels and are handled one at a time, so no handler ever observes
//! another one half done.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::badge::{Badge, QueueSummary};
use super::blob::BlobRegistry;
use super::conflict::{ConflictAction, ConflictPolicy, SkipReason};
use super::error::{DispatchError, OrchestratorError};
use super::history::{HistoryEntry, HistoryStore, MemoryHistoryStore};
use super::item::{DownloadOptions, OptionsError, QueueItem, QueueState};
use super::queue::DownloadQueue;
use super::service::{DownloadId, DownloadRequest, DownloadService, HostEvent, HostState};
use crate::app::settings::{KeepHistory, Settings};
use crate::media::MediaItem;

const COMMAND_BUFFER: usize = 32;

/// Request from the UI side, answered on `respond`
pub enum QueueCommand {
    GetQueue {
        respond: oneshot::Sender<QueueSnapshot>,
    },
    ClearQueue {
        respond: oneshot::Sender<()>,
    },
    Enqueue {
        items: Vec<MediaItem>,
        options: DownloadOptions,
        respond: oneshot::Sender<Result<Vec<Uuid>, OptionsError>>,
    },
}

impl std::fmt::Debug for QueueCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetQueue { .. } => write!(f, "QueueCommand::GetQueue"),
            Self::ClearQueue { .. } => write!(f, "QueueCommand::ClearQueue"),
            Self::Enqueue { items, .. } => write!(f, "QueueCommand::Enqueue({} items)", items.len()),
        }
    }
}

/// Point-in-time copy of the queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub items: Vec<QueueItem>,
    pub concurrent_downloads: usize,
}

pub struct Orchestrator {
    queue: DownloadQueue,
    concurrent_downloads: usize,
    /// Cleared downloads still owed a stop event; `true` when the file must be discarded
    detached: HashMap<DownloadId, bool>,
    service: Arc<dyn DownloadService>,
    history: Arc<dyn HistoryStore>,
    session_history: MemoryHistoryStore,
    blobs: BlobRegistry,
    settings: watch::Receiver<Settings>,
    badge: Badge,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn DownloadService>,
        history: Arc<dyn HistoryStore>,
        blobs: BlobRegistry,
        settings: watch::Receiver<Settings>,
    ) -> Self {
        let (badge, _summary) = Badge::new();
        Self {
            queue: DownloadQueue::new(),
            concurrent_downloads: 0,
            detached: HashMap::new(),
            service,
            history,
            session_history: MemoryHistoryStore::new(),
            blobs,
            settings,
            badge,
        }
    }

    pub fn queue(&self) -> &DownloadQueue {
        &self.queue
    }

    pub fn concurrent_downloads(&self) -> usize {
        self.concurrent_downloads
    }

    pub fn subscribe_summary(&self) -> watch::Receiver<QueueSummary> {
        self.badge.subscribe()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.queue.snapshot(),
            concurrent_downloads: self.concurrent_downloads,
        }
    }

    pub fn summary(&self) -> QueueSummary {
        QueueSummary {
            pending: self.queue.pending_count(),
            total: self.queue.len(),
            concurrent: self.concurrent_downloads,
        }
    }

    /// Publish the current summary immediately
    pub fn publish_summary(&mut self) {
        let summary = self.summary();
        self.badge.publish(summary);
    }

    /// Move the orchestrator onto its own task
    pub fn spawn(
        self,
        events: mpsc::UnboundedReceiver<HostEvent>,
    ) -> (OrchestratorHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let handle = OrchestratorHandle {
            tx,
            summary: self.badge.subscribe(),
        };
        let task = tokio::spawn(self.run(events, commands));
        (handle, task)
    }

    /// Handle events until every command sender is dropped
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<HostEvent>,
        mut commands: mpsc::Receiver<QueueCommand>,
    ) {
        let mut settings = self.settings.clone();
        let mut events_open = true;
        let mut settings_open = true;
        tracing::info!("Queue orchestrator started");

        loop {
            let deadline = self.badge.deadline();
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_host_event(event).await,
                    None => {
                        tracing::debug!("Host event channel closed");
                        events_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                changed = settings.changed(), if settings_open => match changed {
                    Ok(()) => self.on_settings_changed().await,
                    Err(_) => settings_open = false,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.publish_summary();
                }
            }
        }

        self.publish_summary();
        tracing::info!("Queue orchestrator stopped");
    }

    pub async fn handle_command(&mut self, command: QueueCommand) {
        tracing::trace!("Handling {:?}", command);
        match command {
            QueueCommand::GetQueue { respond } => {
                let _ = respond.send(self.snapshot());
            }
            QueueCommand::ClearQueue { respond } => {
                self.clear_queue().await;
                let _ = respond.send(());
            }
            QueueCommand::Enqueue {
                items,
                options,
                respond,
            } => {
                let result = self.enqueue(items, options).await;
                let _ = respond.send(result);
            }
        }
    }

    pub async fn handle_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Created { id, filename } => self.on_download_created(id, &filename).await,
            HostEvent::Changed {
                id,
                state: HostState::Complete,
            } => self.on_download_stopped(id, true).await,
            HostEvent::Changed {
                id,
                state: HostState::Interrupted,
            } => self.on_download_stopped(id, false).await,
            HostEvent::Changed {
                state: HostState::InProgress,
                ..
            } => {}
        }
        self.badge.mark_dirty();
    }

    async fn on_settings_changed(&mut self) {
        tracing::debug!(
            "Settings changed, ceiling is now {}",
            self.settings.borrow().max_concurrent_downloads
        );
        self.drain().await;
        self.badge.mark_dirty();
    }

    /// Append one queue item per media item and start as many as the ceiling allows
    pub async fn enqueue(
        &mut self,
        media: Vec<MediaItem>,
        options: DownloadOptions,
    ) -> Result<Vec<Uuid>, OptionsError> {
        let options = options.validated()?;

        let keep = self.settings.borrow().max_queue_done;
        let evicted = self.queue.evict_terminal(keep);
        if !evicted.is_empty() {
            tracing::debug!("Evicted {} finished items from the queue", evicted.len());
        }

        let mut ids = Vec::with_capacity(media.len());
        for item in media {
            let item = QueueItem::new(item, options.clone());
            ids.push(item.id);
            self.queue.add(item);
        }
        tracing::info!(
            "Enqueued {} items into '{}' ({:?})",
            ids.len(),
            options.download_path,
            options.conflict_action
        );

        self.drain().await;
        self.badge.mark_dirty();
        Ok(ids)
    }

    /// Dispatch waiting items in FIFO order until the ceiling is reached
    pub async fn drain(&mut self) {
        loop {
            let ceiling = self.settings.borrow().max_concurrent_downloads;
            if self.concurrent_downloads >= ceiling {
                tracing::trace!("Ceiling of {} downloads reached", ceiling);
                break;
            }
            let Some(id) = self.queue.first_new() else {
                break;
            };
            if let Some(item) = self.queue.get_mut(id) {
                item.transition(QueueState::Selecting);
            }
            self.dispatch(id).await;
        }
    }

    async fn dispatch(&mut self, id: Uuid) {
        let Some(item) = self.queue.get_by_id(id) else {
            return;
        };
        let conflict_action = item.options.conflict_action;
        let target_path = item.target_path.clone();
        let url = item.url().to_string();
        let is_data_url = item.media.is_data_url;

        if conflict_action == ConflictAction::Skip {
            if let Some(reason) = self.duplicate_reason(id, &url, &target_path).await {
                self.skip(id, reason);
                return;
            }
        }

        let mut request_url = url;
        if is_data_url {
            match self.blobs.materialize(&request_url).await {
                Ok(object_url) => {
                    request_url = object_url.clone();
                    if let Some(item) = self.queue.get_mut(id) {
                        item.object_url = Some(object_url);
                    }
                }
                Err(e) => {
                    self.fail(id, e).await;
                    return;
                }
            }
        }

        let request = DownloadRequest {
            url: request_url,
            target_path,
            conflict_action: ConflictPolicy::translate(conflict_action),
        };
        match self.service.start(request).await {
            Ok(download_id) => {
                if let Some(item) = self.queue.get_mut(id) {
                    item.download_id = Some(download_id);
                    item.transition(QueueState::InProgress);
                    item.log_info(format!("Started download {}", download_id));
                }
                self.concurrent_downloads += 1;
                tracing::debug!(
                    "Dispatched {} as download {} ({} running)",
                    id,
                    download_id,
                    self.concurrent_downloads
                );
            }
            Err(e) => self.fail(id, e).await,
        }
    }

    async fn duplicate_reason(&self, id: Uuid, url: &str, target_path: &str) -> Option<SkipReason> {
        if self.queue.has_claimed_target(target_path, id) {
            return Some(SkipReason::AlreadyQueued);
        }

        let store = self.history_store()?;
        match store.contains(url, target_path).await {
            Ok(true) => Some(SkipReason::AlreadyDownloaded),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!("History lookup failed, assuming not downloaded: {}", e);
                None
            }
        }
    }

    fn skip(&mut self, id: Uuid, reason: SkipReason) {
        let Some(item) = self.queue.get_mut(id) else {
            return;
        };
        item.skip_reason = Some(reason);
        item.transition(QueueState::Skipped);
        item.log_info(format!("Skipped: {}", reason));
        tracing::info!("Skipped '{}': {}", item.target_path, reason);
    }

    async fn fail(&mut self, id: Uuid, error: DispatchError) {
        let Some(item) = self.queue.get_mut(id) else {
            return;
        };
        tracing::warn!("Download of {} failed: {}", item.url(), error);
        item.error = Some(error.to_string());
        item.transition(QueueState::Failed);
        item.log_error(format!("Failed to start: {}", error));
        let object_url = item.object_url.take();

        if let Some(object_url) = object_url {
            self.blobs.release(&object_url).await;
        }
    }

    /// The service created the file; `filename` is the name it actually chose
    pub async fn on_download_created(&mut self, download_id: DownloadId, filename: &str) {
        let Some(item) = self.queue.find_by_download_id_mut(download_id) else {
            tracing::debug!("Created event for unknown download {}", download_id);
            return;
        };
        item.start = Some(Utc::now());
        item.log_info(format!("Saving to '{}'", filename));

        let renamed = item.options.conflict_action == ConflictAction::Skip
            && item.state == QueueState::InProgress
            && ConflictPolicy::was_renamed(&item.output_filename(), filename);
        if !renamed {
            return;
        }

        item.skip_reason = Some(SkipReason::FileExists);
        item.transition(QueueState::Skipped);
        item.log_info(format!("Skipped: {}", SkipReason::FileExists));
        tracing::info!("Skipped '{}': {}", item.target_path, SkipReason::FileExists);

        if let Err(e) = self.service.cancel(download_id).await {
            tracing::debug!("Cancel of download {} failed: {}", download_id, e);
        }
    }

    /// The download finished or was interrupted; frees its slot
    pub async fn on_download_stopped(&mut self, download_id: DownloadId, succeeded: bool) {
        if let Some(discard) = self.detached.remove(&download_id) {
            tracing::debug!("Detached download {} stopped", download_id);
            if discard {
                self.discard_file(download_id).await;
            }
            self.release_slot();
            self.drain().await;
            return;
        }

        let Some(item) = self.queue.find_by_download_id_mut(download_id) else {
            tracing::debug!("Stop event for unknown download {}", download_id);
            return;
        };
        if item.finish.is_some() {
            tracing::debug!("Ignoring repeated stop event for download {}", download_id);
            return;
        }

        item.finish = Some(Utc::now());
        let object_url = item.object_url.take();
        let skipped = item.state == QueueState::Skipped;
        if !skipped {
            let next = if succeeded {
                QueueState::Completed
            } else {
                QueueState::Interrupted
            };
            item.transition(next);
            item.log_info(format!("Download {:?}", next));
            tracing::info!("Download {} of '{}' {:?}", download_id, item.target_path, next);
        }
        let erase = item.options.erase_history;
        let entry = (item.state == QueueState::Completed)
            .then(|| HistoryEntry::new(item.url(), item.target_path.clone()));

        if let Some(object_url) = object_url {
            self.blobs.release(&object_url).await;
        }

        if skipped {
            self.discard_file(download_id).await;
        } else {
            if erase {
                if let Err(e) = self.service.erase(download_id).await {
                    tracing::warn!("Failed to erase download {}: {}", download_id, e);
                }
            }
            if let Some(entry) = entry {
                self.record_history(entry).await;
            }
        }

        self.release_slot();
        self.drain().await;
    }

    /// Remove every item; running downloads keep their slot until they stop
    pub async fn clear_queue(&mut self) {
        let items = self.queue.clear();
        let count = items.len();
        for item in items {
            if let Some(download_id) = item.download_id {
                if item.finish.is_none() {
                    self.detached
                        .insert(download_id, item.state == QueueState::Skipped);
                }
            }
            if let Some(object_url) = item.object_url {
                self.blobs.release(&object_url).await;
            }
        }
        tracing::info!(
            "Cleared {} queue items, {} downloads still running",
            count,
            self.detached.len()
        );
        self.badge.mark_dirty();
    }

    async fn discard_file(&self, download_id: DownloadId) {
        if let Err(e) = self.service.remove_file(download_id).await {
            tracing::debug!("Failed to remove file of download {}: {}", download_id, e);
        }
        if let Err(e) = self.service.erase(download_id).await {
            tracing::debug!("Failed to erase download {}: {}", download_id, e);
        }
    }

    async fn record_history(&self, entry: HistoryEntry) {
        let max = self.settings.borrow().max_history;
        let Some(store) = self.history_store() else {
            return;
        };
        if let Err(e) = store.append(entry, max).await {
            tracing::warn!("Failed to record download history: {}", e);
        }
    }

    fn history_store(&self) -> Option<&dyn HistoryStore> {
        let keep = self.settings.borrow().keep_history;
        match keep {
            KeepHistory::Never => None,
            KeepHistory::Session => Some(&self.session_history as &dyn HistoryStore),
            KeepHistory::Always => Some(self.history.as_ref()),
        }
    }

    fn release_slot(&mut self) {
        self.concurrent_downloads = self.concurrent_downloads.saturating_sub(1);
    }
}

/// Cloneable front door to a spawned orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<QueueCommand>,
    summary: watch::Receiver<QueueSummary>,
}

impl OrchestratorHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
    ) -> Result<T, OrchestratorError> {
        let (respond, response) = oneshot::channel();
        self.tx
            .send(build(respond))
            .await
            .map_err(|_| OrchestratorError::Closed)?;
        response.await.map_err(|_| OrchestratorError::Closed)
    }

    pub async fn get_queue(&self) -> Result<QueueSnapshot, OrchestratorError> {
        self.request(|respond| QueueCommand::GetQueue { respond })
            .await
    }

    pub async fn clear_queue(&self) -> Result<(), OrchestratorError> {
        self.request(|respond| QueueCommand::ClearQueue { respond })
            .await
    }

    pub async fn enqueue(
        &self,
        items: Vec<MediaItem>,
        options: DownloadOptions,
    ) -> Result<Vec<Uuid>, OrchestratorError> {
        let ids = self
            .request(|respond| QueueCommand::Enqueue {
                items,
                options,
                respond,
            })
            .await??;
        Ok(ids)
    }

    /// Coalesced queue summary updates
    pub fn summary(&self) -> watch::Receiver<QueueSummary> {
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::history::DownloadHistory;
    use crate::download::service::HostState;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct RecordingService {
        next_id: AtomicU64,
        started: Mutex<Vec<DownloadRequest>>,
        cancelled: Mutex<Vec<DownloadId>>,
    }

    #[async_trait]
    impl DownloadService for RecordingService {
        async fn start(&self, request: DownloadRequest) -> Result<DownloadId, DispatchError> {
            if request.url.contains("reject") {
                return Err(DispatchError::Rejected("blocked".to_string()));
            }
            self.started.lock().unwrap().push(request);
            Ok(DownloadId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
        }

        async fn cancel(&self, id: DownloadId) -> Result<(), DispatchError> {
            self.cancelled.lock().unwrap().push(id);
            Ok(())
        }

        async fn remove_file(&self, _id: DownloadId) -> Result<(), DispatchError> {
            Ok(())
        }

        async fn erase(&self, _id: DownloadId) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    fn orchestrator(max: usize) -> (Orchestrator, Arc<RecordingService>, watch::Sender<Settings>) {
        let service = Arc::new(RecordingService::default());
        let settings = Settings {
            max_concurrent_downloads: max,
            ..Settings::default()
        };
        let (settings_tx, settings_rx) = watch::channel(settings);
        let orchestrator = Orchestrator::new(
            service.clone(),
            Arc::new(MemoryHistoryStore::new()),
            BlobRegistry::new(),
            settings_rx,
        );
        (orchestrator, service, settings_tx)
    }

    fn media(urls: &[&str]) -> Vec<MediaItem> {
        urls.iter().map(|u| MediaItem::from_url(u).unwrap()).collect()
    }

    fn states(orchestrator: &Orchestrator) -> Vec<QueueState> {
        orchestrator.queue().iter().map(|i| i.state).collect()
    }

    #[tokio::test]
    async fn test_enqueue_respects_ceiling() {
        let (mut orchestrator, service, _settings) = orchestrator(2);
        orchestrator
            .enqueue(
                media(&["http://a/1.jpg", "http://a/2.jpg", "http://a/3.jpg"]),
                DownloadOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(orchestrator.concurrent_downloads(), 2);
        assert_eq!(service.started.lock().unwrap().len(), 2);
        assert_eq!(
            states(&orchestrator),
            vec![QueueState::InProgress, QueueState::InProgress, QueueState::New]
        );
    }

    #[tokio::test]
    async fn test_stop_frees_slot_and_drains() {
        let (mut orchestrator, service, _settings) = orchestrator(1);
        orchestrator
            .enqueue(media(&["http://a/1.jpg", "http://a/2.jpg"]), DownloadOptions::default())
            .await
            .unwrap();

        orchestrator
            .handle_host_event(HostEvent::Changed {
                id: DownloadId(1),
                state: HostState::Complete,
            })
            .await;

        assert_eq!(
            states(&orchestrator),
            vec![QueueState::Completed, QueueState::InProgress]
        );
        assert_eq!(orchestrator.concurrent_downloads(), 1);
        assert_eq!(service.started.lock().unwrap()[1].target_path, "2.jpg");
    }

    #[tokio::test]
    async fn test_rejection_fails_without_using_slot() {
        let (mut orchestrator, _service, _settings) = orchestrator(1);
        orchestrator
            .enqueue(
                media(&["http://reject/1.jpg", "http://a/2.jpg"]),
                DownloadOptions::default(),
            )
            .await
            .unwrap();

        let items = orchestrator.snapshot().items;
        assert_eq!(items[0].state, QueueState::Failed);
        assert!(items[0].error.as_deref().unwrap().contains("blocked"));
        assert_eq!(items[1].state, QueueState::InProgress);
        assert_eq!(orchestrator.concurrent_downloads(), 1);
    }

    #[tokio::test]
    async fn test_repeated_stop_event_is_ignored() {
        let (mut orchestrator, _service, _settings) = orchestrator(2);
        orchestrator
            .enqueue(media(&["http://a/1.jpg", "http://a/2.jpg"]), DownloadOptions::default())
            .await
            .unwrap();

        orchestrator.on_download_stopped(DownloadId(1), true).await;
        orchestrator.on_download_stopped(DownloadId(1), false).await;

        assert_eq!(orchestrator.concurrent_downloads(), 1);
        assert_eq!(orchestrator.queue().iter().next().unwrap().state, QueueState::Completed);
    }

    #[tokio::test]
    async fn test_rename_under_skip_cancels() {
        let (mut orchestrator, service, _settings) = orchestrator(1);
        let options = DownloadOptions {
            conflict_action: ConflictAction::Skip,
            ..Default::default()
        };
        orchestrator.enqueue(media(&["http://a/x.jpg"]), options).await.unwrap();

        orchestrator
            .on_download_created(DownloadId(1), "/downloads/x (1).jpg")
            .await;
        assert_eq!(states(&orchestrator), vec![QueueState::Skipped]);
        assert_eq!(*service.cancelled.lock().unwrap(), vec![DownloadId(1)]);
        assert_eq!(orchestrator.concurrent_downloads(), 1);

        orchestrator.on_download_stopped(DownloadId(1), false).await;
        assert_eq!(states(&orchestrator), vec![QueueState::Skipped]);
        assert_eq!(orchestrator.concurrent_downloads(), 0);
    }

    #[tokio::test]
    async fn test_rename_check_ignores_download_path() {
        let (mut orchestrator, service, _settings) = orchestrator(1);
        let options = DownloadOptions {
            conflict_action: ConflictAction::Skip,
            download_path: "pics".to_string(),
            ..Default::default()
        };
        orchestrator.enqueue(media(&["http://a/x.jpg"]), options).await.unwrap();

        // Host kept the name but not the sub-directory
        orchestrator
            .on_download_created(DownloadId(1), "/downloads/x.jpg")
            .await;
        assert_eq!(states(&orchestrator), vec![QueueState::InProgress]);
        assert!(service.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_recorded_in_session_mode() {
        let (mut orchestrator, _service, settings) = orchestrator(1);
        settings.send_modify(|s| s.keep_history = KeepHistory::Session);
        orchestrator
            .enqueue(media(&["http://a/x.jpg"]), DownloadOptions::default())
            .await
            .unwrap();
        orchestrator.on_download_stopped(DownloadId(1), true).await;

        let session: DownloadHistory = orchestrator.session_history.load().await.unwrap();
        assert_eq!(session.entries, vec![HistoryEntry::new("http://a/x.jpg", "x.jpg")]);
        assert!(orchestrator.history.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_enqueue() {
        let (mut orchestrator, _service, _settings) = orchestrator(1);
        let options = DownloadOptions {
            download_path: "/etc".to_string(),
            ..Default::default()
        };
        let result = orchestrator.enqueue(media(&["http://a/x.jpg"]), options).await;
        assert!(matches!(result, Err(OptionsError::AbsolutePath(_))));
        assert!(orchestrator.queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_round_trip_and_badge() {
        let (orchestrator, _service, _settings) = orchestrator(1);
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (handle, task) = orchestrator.spawn(events_rx);
        let mut summary = handle.summary();

        let ids = handle
            .enqueue(media(&["http://a/1.jpg", "http://a/2.jpg"]), DownloadOptions::default())
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let snapshot = handle.get_queue().await.unwrap();
        assert_eq!(snapshot.concurrent_downloads, 1);
        assert_eq!(snapshot.items.len(), 2);

        summary.changed().await.unwrap();
        assert_eq!(
            *summary.borrow(),
            QueueSummary {
                pending: 2,
                total: 2,
                concurrent: 1
            }
        );

        handle.clear_queue().await.unwrap();
        assert!(handle.get_queue().await.unwrap().items.is_empty());

        drop(handle);
        task.await.unwrap();
    }
}
