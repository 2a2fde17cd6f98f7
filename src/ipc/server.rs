//! JSON-lines server connecting a UI to a running orchestrator.
//!
//! Reads one request per line, writes one response per request and pushes a
//! `summary` message whenever the coalesced queue summary changes.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::protocol::{UiMessage, UiRequest};
use crate::download::OrchestratorHandle;
use crate::mask::NamingMask;
use crate::media::{MediaItem, prepare_candidates};

/// Serve requests from `reader` until it reaches end of input.
pub async fn serve<R, W>(reader: R, mut writer: W, handle: OrchestratorHandle) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut summary = handle.summary();
    let mut summary_open = true;

    tracing::info!("UI server started");

    loop {
        let message = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<UiRequest>(line) {
                    Ok(request) => process_request(request, &handle).await,
                    Err(e) => {
                        tracing::warn!("Invalid UI message: {} (raw: {})", e, line);
                        UiMessage::error(format!("Invalid message: {}", e))
                    }
                }
            }
            changed = summary.changed(), if summary_open => {
                if changed.is_err() {
                    summary_open = false;
                    continue;
                }
                let current = *summary.borrow_and_update();
                UiMessage::Summary(current)
            }
        };

        let line = match message.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to serialize UI message: {}", e);
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }

    tracing::info!("UI client disconnected");
    Ok(())
}

/// Process a single request and return the response
pub async fn process_request(request: UiRequest, handle: &OrchestratorHandle) -> UiMessage {
    match request {
        UiRequest::GetQueue => match handle.get_queue().await {
            Ok(snapshot) => UiMessage::Queue(snapshot),
            Err(e) => UiMessage::error(e.to_string()),
        },
        UiRequest::ClearQueue => match handle.clear_queue().await {
            Ok(()) => match handle.get_queue().await {
                Ok(snapshot) => UiMessage::Queue(snapshot),
                Err(e) => UiMessage::error(e.to_string()),
            },
            Err(e) => UiMessage::error(e.to_string()),
        },
        UiRequest::PrepareMedia { records } => {
            let mut items = Vec::new();
            for record in prepare_candidates(records) {
                match MediaItem::from_raw(record) {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::debug!("Dropping candidate: {}", e),
                }
            }
            UiMessage::Media { items }
        }
        UiRequest::DownloadMediaItems {
            options,
            mut media_items,
            naming_mask,
        } => {
            if let Some(expression) = naming_mask {
                let mask = NamingMask::new(&expression);
                if let Some(error) = mask.error() {
                    tracing::warn!("Refusing download with broken naming mask '{}': {}", expression, error);
                    return UiMessage::error(format!("Invalid naming mask: {}", error));
                }
                for item in media_items.iter_mut() {
                    item.selected = true;
                }
                mask.apply(&mut media_items);
            }

            match handle.enqueue(media_items, options).await {
                Ok(ids) => UiMessage::Accepted { ids },
                Err(e) => UiMessage::error(e.to_string()),
            }
        }
    }
}
