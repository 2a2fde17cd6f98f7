use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do when the target path already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    /// Save under a new unique name
    #[default]
    Uniquify,
    /// Replace the existing file
    Overwrite,
    /// Leave the existing file alone and do not download
    Skip,
}

/// The subset of conflict actions the download service understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostConflictAction {
    Uniquify,
    Overwrite,
}

/// Why an item was skipped without downloading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Another queue item already claimed the target path
    AlreadyQueued,
    /// The history has a download of this URL to this path
    AlreadyDownloaded,
    /// The service renamed the file, so it already existed on disk
    FileExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::AlreadyQueued => "already queued",
            SkipReason::AlreadyDownloaded => "already downloaded",
            SkipReason::FileExists => "file already exists",
        };
        f.write_str(text)
    }
}

/// Skip is emulated on top of a service that only uniquifies or overwrites:
/// the item is started with `uniquify` and cancelled if the service had to
/// pick a different name.
pub struct ConflictPolicy;

impl ConflictPolicy {
    pub fn translate(action: ConflictAction) -> HostConflictAction {
        match action {
            ConflictAction::Uniquify | ConflictAction::Skip => HostConflictAction::Uniquify,
            ConflictAction::Overwrite => HostConflictAction::Overwrite,
        }
    }

    /// True if the service stored the file under a different name than requested.
    ///
    /// Separators differ between hosts, so both sides are compared with all
    /// `/` and `\` removed.
    pub fn was_renamed(requested: &str, actual: &str) -> bool {
        let strip = |s: &str| s.chars().filter(|c| *c != '/' && *c != '\\').collect::<String>();
        !strip(actual).ends_with(&strip(requested))
    }
}
