use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

use super::mime::extension_for_mime;
use super::raw::{MediaSource, RawMedia};

/// `name.ext` as the last segment, ended by a query, fragment or end of input
static NAME_AND_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([^/]+)\.([a-z0-9]+)(\?|#|$)").expect("Invalid regex pattern")
});

/// Last non-empty path segment, optionally followed by a slash
static BASENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/([^/]+)/?(\?|#|$)").expect("Invalid regex pattern")
});

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid media URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Normalized media candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: Url,
    pub source: MediaSource,
    pub mime: Option<String>,
    pub tag: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub download: Option<String>,
    pub tab_url: Option<Url>,
    pub frame_url: Option<Url>,
    pub tab_title: Option<String>,
    pub frame_title: Option<String>,

    pub filename: String,
    pub extension: String,
    pub is_data_url: bool,
    pub is_filename_in_url: bool,
    pub is_extension_in_url: bool,

    /// Chosen for download by the user
    #[serde(default)]
    pub selected: bool,
    /// Output of the last naming mask evaluation
    #[serde(default)]
    pub mask_name: Option<String>,
}

impl MediaItem {
    /// Build from a scraper record, deriving filename and extension.
    pub fn from_raw(raw: RawMedia) -> Result<Self, MediaError> {
        let url = Url::parse(&raw.url).map_err(|source| MediaError::InvalidUrl {
            url: raw.url.clone(),
            source,
        })?;

        // Page context URLs are optional; unparsable ones are treated as absent
        let tab_url = raw.tab_url.as_deref().and_then(|u| Url::parse(u).ok());
        let frame_url = raw.frame_url.as_deref().and_then(|u| Url::parse(u).ok());

        let mut item = Self {
            url,
            source: raw.source,
            mime: raw.mime,
            tag: raw.tag,
            alt: raw.alt,
            title: raw.title,
            text: raw.text,
            width: raw.width,
            height: raw.height,
            download: raw.download,
            tab_url,
            frame_url,
            tab_title: raw.tab_title,
            frame_title: raw.frame_title,
            filename: String::new(),
            extension: String::new(),
            is_data_url: false,
            is_filename_in_url: false,
            is_extension_in_url: false,
            selected: false,
            mask_name: None,
        };
        item.derive_filename();
        Ok(item)
    }

    /// Convenience constructor for a link-sourced URL
    pub fn from_url(url: &str) -> Result<Self, MediaError> {
        Self::from_raw(RawMedia::new(MediaSource::Link, url))
    }

    /// `filename.extension`
    pub fn full_filename(&self) -> String {
        if self.extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }

    /// Name used for the target path: the mask output when non-empty, otherwise the derived name
    pub fn output_filename(&self) -> String {
        match &self.mask_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.full_filename(),
        }
    }

    fn derive_filename(&mut self) {
        if self.url.scheme() == "data" {
            self.derive_data_url_filename();
            return;
        }

        let path = self.url.path().to_string();
        if path == "/" {
            self.filename = "index".to_string();
            self.extension = "html".to_string();
            return;
        }

        if let Some((name, ext)) = split_name_and_ext(&path) {
            self.filename = name;
            self.extension = ext;
            self.is_filename_in_url = true;
            self.is_extension_in_url = true;
            return;
        }

        if let Some(caps) = BASENAME.captures(&path) {
            self.filename = decode_component(&caps[1]);
            self.extension = extension_for_mime(self.mime.as_deref())
                .unwrap_or("html")
                .to_string();
            self.is_filename_in_url = true;
            return;
        }

        self.filename = "unnamed".to_string();
        self.extension = "html".to_string();
    }

    fn derive_data_url_filename(&mut self) {
        self.is_data_url = true;

        let href = self.url.as_str();
        let header_start = href.find(':').map(|i| i + 1).unwrap_or(0);
        let header = &href[header_start..];
        let mime_end = header.find([';', ',']).unwrap_or(header.len());
        let mime = &header[..mime_end];
        self.mime = Some(if mime.is_empty() {
            "text/plain".to_string()
        } else {
            mime.to_string()
        });

        if let Some((name, ext)) = self.download.as_deref().and_then(split_name_and_ext) {
            self.filename = name;
            self.extension = ext;
            return;
        }

        self.filename = match self.download.as_deref() {
            Some(hint) if !hint.is_empty() => flatten_separators(hint),
            _ => "data".to_string(),
        };
        self.extension = extension_for_mime(self.mime.as_deref())
            .unwrap_or("txt")
            .to_string();
    }
}

fn split_name_and_ext(input: &str) -> Option<(String, String)> {
    let caps = NAME_AND_EXT.captures(input)?;
    Some((decode_component(&caps[1]), decode_component(&caps[2])))
}

/// Percent-decode one name segment, keeping the raw text when the result is
/// not valid UTF-8. Encoded separators must not turn into directories.
fn decode_component(input: &str) -> String {
    let decoded = urlencoding::decode(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| input.to_string());
    flatten_separators(&decoded)
}

fn flatten_separators(input: &str) -> String {
    input.replace(['/', '\\'], "_")
}
