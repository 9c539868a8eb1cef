//! Outgoing message dispatch: plain messages, and messages with attachments
//! that are uploaded first.

use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use orion_core::{Attachment, AttachmentId, IdFactory, TransportError};
use orion_transport::{AttachmentTransport, LocalFile, UploadEvent, UploadPart};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::operators::{Throttle, sleep_until_opt};

/// A message being composed: text plus raw files not yet uploaded.
#[derive(Debug, Clone, Default)]
pub struct OutgoingComposite {
    /// Message body.
    pub text: String,
    /// Files to upload before sending.
    pub files: Vec<LocalFile>,
}

impl OutgoingComposite {
    /// Text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            files: Vec::new(),
        }
    }

    /// Text plus files.
    pub fn with_files(text: impl Into<String>, files: Vec<LocalFile>) -> Self {
        Self {
            text: text.into(),
            files,
        }
    }
}

/// Mint an attachment record and an upload part for every file.
pub(crate) fn prepare(files: Vec<LocalFile>, ids: &dyn IdFactory) -> (Vec<Attachment>, Vec<UploadPart>) {
    files
        .into_iter()
        .map(|file| {
            let attachment_id = ids.new_attachment_id();
            let attachment = Attachment {
                file_id: attachment_id.clone(),
                name: file.name.clone(),
                size: file.size,
                last_modified: file.last_modified,
                mime_type: file.mime_type.clone(),
            };
            (attachment, UploadPart { attachment_id, file })
        })
        .unzip()
}

/// Rewrite client-generated ids to the server-issued ones.
pub(crate) fn finalize(
    mut attachments: Vec<Attachment>,
    server_ids: &HashMap<AttachmentId, AttachmentId>,
) -> Result<Vec<Attachment>, ChatError> {
    let missing: Vec<AttachmentId> = attachments
        .iter()
        .filter(|a| !server_ids.contains_key(&a.file_id))
        .map(|a| a.file_id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ChatError::UploadIncomplete { missing });
    }
    for attachment in &mut attachments {
        if let Some(server_id) = server_ids.get(&attachment.file_id) {
            attachment.file_id = server_id.clone();
        }
    }
    Ok(attachments)
}

/// Publish a percent unless it would move progress backwards.
fn publish_progress(progress: &watch::Sender<Option<u8>>, pct: u8) {
    let _ = progress.send_if_modified(|current| match *current {
        Some(prev) if prev >= pct => false,
        _ => {
            *current = Some(pct);
            true
        }
    });
}

/// Resets upload progress to `None` when dropped, including when the upload
/// future itself is dropped mid-flight.
struct ProgressReset<'a>(&'a watch::Sender<Option<u8>>);

impl Drop for ProgressReset<'_> {
    fn drop(&mut self) {
        let _ = self.0.send_replace(None);
    }
}

/// Drive one upload to completion, pumping throttled progress into
/// `progress`. Progress starts at `Some(0)` and is reset to `None` exactly
/// once on the way out, whatever the outcome, even if the caller drops the
/// future.
pub(crate) async fn run_upload(
    transport: &dyn AttachmentTransport,
    parts: Vec<UploadPart>,
    progress: &watch::Sender<Option<u8>>,
    throttle_period: Duration,
    token: &CancellationToken,
) -> Result<HashMap<AttachmentId, AttachmentId>, ChatError> {
    let files = parts.len();
    let _ = progress.send_replace(Some(0));
    let reset = ProgressReset(progress);
    let mut throttle = Throttle::new(throttle_period);
    let mut events = transport.upload(parts);
    info!(files, "upload started");

    let outcome = loop {
        let event = tokio::select! {
            () = token.cancelled() => break Err(ChatError::Transport(TransportError::ConnectionClosed)),
            () = sleep_until_opt(throttle.deadline()) => {
                if let Some(pct) = throttle.poll_due(Instant::now()) {
                    publish_progress(progress, pct);
                }
                continue;
            }
            event = events.next() => event,
        };
        match event {
            Some(Ok(UploadEvent::Progress(p))) => {
                if let Some(pct) = throttle.push_at(Instant::now(), p.percent()) {
                    publish_progress(progress, pct);
                }
            }
            Some(Ok(UploadEvent::Response { status: 200, ids, .. })) => break Ok(ids),
            Some(Ok(UploadEvent::Response {
                status,
                status_text,
                ..
            })) => break Err(ChatError::Upload(TransportError::from_status(status, status_text))),
            Some(Err(e)) => break Err(ChatError::Upload(e)),
            None => {
                break Err(ChatError::Upload(TransportError::Network(
                    "upload ended without a response".into(),
                )));
            }
        }
    };

    throttle.finish();
    drop(reset);
    match &outcome {
        Ok(ids) => debug!(files, mapped = ids.len(), "upload finished"),
        Err(e) => warn!(files, error = %e, "upload failed"),
    }
    outcome
}
