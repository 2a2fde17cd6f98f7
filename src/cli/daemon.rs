use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::config::Config;
use crate::app::settings::SettingsStore;
use crate::download::{BlobRegistry, FileHistoryStore, HttpDownloadService, Orchestrator, OrchestratorHandle};
use crate::ipc::server;
use crate::util::paths;

/// A running orchestrator wired to the HTTP download service
pub struct QueueService {
    pub handle: OrchestratorHandle,
    pub settings: SettingsStore,
    task: JoinHandle<()>,
}

impl QueueService {
    /// Build the service stack from configuration and spawn the orchestrator
    pub fn start(config: &Config) -> Result<Self> {
        let root = paths::resolve_download_root(&config.download.directory)?;
        std::fs::create_dir_all(&root)
            .context(format!("Failed to create download directory {:?}", root))?;

        let blobs = BlobRegistry::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let service = HttpDownloadService::with_client_options(
            root.clone(),
            blobs.clone(),
            events_tx,
            &config.download.user_agent,
            config.request_timeout(),
        )
        .context("Failed to build HTTP client")?;
        let history = FileHistoryStore::new(paths::history_path()?);
        let settings = SettingsStore::new(config.settings.clone());

        let orchestrator = Orchestrator::new(
            Arc::new(service),
            Arc::new(history),
            blobs,
            settings.subscribe(),
        );
        let (handle, task) = orchestrator.spawn(events_rx);

        tracing::info!("Queue service started, downloading into {:?}", root);
        Ok(Self {
            handle,
            settings,
            task,
        })
    }

    /// Drop the command channel and wait for the orchestrator to stop
    pub async fn shutdown(self) -> Result<()> {
        let Self { handle, task, .. } = self;
        drop(handle);
        task.await.context("Queue orchestrator panicked")?;
        Ok(())
    }
}

/// Serve the UI protocol on stdin/stdout until end of input or Ctrl+C
pub async fn run_daemon(config: Config) -> Result<()> {
    tracing::info!("Starting serve mode...");
    let service = QueueService::start(&config)?;

    tokio::select! {
        result = server::serve(tokio::io::stdin(), tokio::io::stdout(), service.handle.clone()) => {
            result.context("UI connection failed")?;
        }
        result = signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down..."),
            Err(e) => tracing::error!("Error waiting for Ctrl+C: {}", e),
        },
    }

    service.shutdown().await?;
    tracing::info!("Serve mode stopped");
    Ok(())
}
