//! Download queue, history and the services that move bytes

pub mod badge;
pub mod blob;
pub mod conflict;
pub mod error;
pub mod history;
pub mod http_service;
pub mod item;
pub mod orchestrator;
pub mod queue;
pub mod service;

pub use badge::QueueSummary;
pub use blob::BlobRegistry;
pub use conflict::{ConflictAction, ConflictPolicy, SkipReason};
pub use error::{DispatchError, OrchestratorError, PersistenceError};
pub use history::{DownloadHistory, FileHistoryStore, HistoryEntry, HistoryStore, MemoryHistoryStore};
pub use http_service::HttpDownloadService;
pub use item::{DownloadOptions, OptionsError, QueueItem, QueueState};
pub use orchestrator::{Orchestrator, OrchestratorHandle, QueueCommand, QueueSnapshot};
pub use service::{DownloadId, DownloadRequest, DownloadService, HostEvent, HostState};
