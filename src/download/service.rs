//! Contract between the queue orchestrator and whatever actually moves bytes.
//!
//! A service accepts [`DownloadRequest`]s, hands back a [`DownloadId`] and
//! later reports progress as [`HostEvent`]s on the channel it was built with.
//! The orchestrator never assumes events arrive in any particular order
//! relative to other downloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::conflict::HostConflictAction;
use super::error::DispatchError;

/// Identifier assigned by the download service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub u64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Resolved URL (an object URL for materialized data: URLs)
    pub url: String,
    /// Path relative to the download root, `/` separated
    pub target_path: String,
    pub conflict_action: HostConflictAction,
}

/// Download state as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    InProgress,
    Interrupted,
    Complete,
}

/// Notification from the download service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The download exists; `filename` is the final on-disk name chosen by the service
    Created { id: DownloadId, filename: String },
    Changed { id: DownloadId, state: HostState },
}

#[async_trait]
pub trait DownloadService: Send + Sync {
    /// Start a download. Acceptance means events for the returned id will follow.
    async fn start(&self, request: DownloadRequest) -> Result<DownloadId, DispatchError>;

    /// Stop a running download. Fails if it has already finished.
    async fn cancel(&self, id: DownloadId) -> Result<(), DispatchError>;

    /// Delete the downloaded file from disk
    async fn remove_file(&self, id: DownloadId) -> Result<(), DispatchError>;

    /// Forget the download record
    async fn erase(&self, id: DownloadId) -> Result<(), DispatchError>;
}
