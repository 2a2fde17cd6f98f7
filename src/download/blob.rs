//! Transient storage for materialized `data:` URLs
//!
//! The download service only knows how to fetch URLs, so inline payloads are
//! decoded up front and parked here under a `blob:` reference until the
//! download stops.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::DispatchError;

pub const BLOB_SCHEME: &str = "blob:";
const BLOB_PREFIX: &str = "blob:grabbag/";

/// Decoded data URL payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    /// Decode `data:[<mime>][;params][;base64],<payload>`
    pub fn from_data_url(data_url: &str) -> Result<Self, DispatchError> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| DispatchError::InvalidDataUrl("missing data: prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| DispatchError::InvalidDataUrl("missing ',' separator".to_string()))?;

        let mut params = header.split(';');
        let mime = match params.next().map(str::trim) {
            Some(m) if !m.is_empty() => m.to_ascii_lowercase(),
            _ => "text/plain".to_string(),
        };
        let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

        let bytes = if is_base64 {
            let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let decoded = urlencoding::decode(&compact)
                .map_err(|e| DispatchError::InvalidDataUrl(e.to_string()))?;
            STANDARD
                .decode(decoded.as_bytes())
                .map_err(|e| DispatchError::InvalidDataUrl(e.to_string()))?
        } else {
            urlencoding::decode_binary(payload.as_bytes()).into_owned()
        };

        Ok(Self { mime, bytes })
    }
}

/// Shared registry of live object references
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `data_url` and return a fresh object reference for it
    pub async fn materialize(&self, data_url: &str) -> Result<String, DispatchError> {
        let blob = Blob::from_data_url(data_url)?;
        let object_url = format!("{}{}", BLOB_PREFIX, Uuid::new_v4());
        tracing::debug!(
            "Materialized {} byte {} blob as {}",
            blob.bytes.len(),
            blob.mime,
            object_url
        );
        self.blobs.write().await.insert(object_url.clone(), blob);
        Ok(object_url)
    }

    pub async fn get(&self, object_url: &str) -> Option<Blob> {
        self.blobs.read().await.get(object_url).cloned()
    }

    /// Drop the payload. Releasing an unknown reference is a no-op.
    pub async fn release(&self, object_url: &str) -> bool {
        let removed = self.blobs.write().await.remove(object_url).is_some();
        if removed {
            tracing::debug!("Released blob {}", object_url);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}
