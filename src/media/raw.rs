//! Candidate records as produced by the page scraper.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Where on the page a candidate was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Target of an `<a>` element
    Link,
    /// Source of an embedded element (img, audio, video, object, picture)
    Embed,
    /// URL found in plain text
    Text,
}

/// Raw candidate record handed over by the scraper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMedia {
    pub source: MediaSource,
    pub url: String,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Suggested filename from a `download` attribute
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub tab_url: Option<String>,
    #[serde(default)]
    pub frame_url: Option<String>,
    #[serde(default)]
    pub tab_title: Option<String>,
    #[serde(default)]
    pub frame_title: Option<String>,
}

impl RawMedia {
    /// Create a bare record with only a source and URL
    pub fn new(source: MediaSource, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            mime: None,
            tag: None,
            alt: None,
            title: None,
            text: None,
            width: None,
            height: None,
            download: None,
            tab_url: None,
            frame_url: None,
            tab_title: None,
            frame_title: None,
        }
    }

    /// False for empty, `javascript:` and `blob:` URLs
    pub fn has_valid_url(&self) -> bool {
        !self.url.is_empty()
            && !self.url.starts_with("javascript:")
            && !self.url.starts_with("blob:")
    }
}

/// Prepare scraped records for display and queueing.
///
/// Drops records with unusable URLs, removes duplicate URLs on a first-seen
/// basis and sorts the survivors by URL.
pub fn prepare_candidates(records: Vec<RawMedia>) -> Vec<RawMedia> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<RawMedia> = records
        .into_iter()
        .filter(RawMedia::has_valid_url)
        .filter(|record| seen.insert(record.url.clone()))
        .collect();

    candidates.sort_by(|a, b| a.url.cmp(&b.url));
    candidates
}
