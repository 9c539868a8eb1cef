//! Seams between the orchestrator and its HTTP collaborators.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use orion_core::{Attachment, AttachmentId, CompoundWebVideo, InboundEvent, MessageId, TransportError};

use crate::file::LocalFile;

/// One file in a multipart upload, keyed by its client-generated id.
#[derive(Clone, Debug)]
pub struct UploadPart {
    /// Client-generated id the server echoes back in its id mapping.
    pub attachment_id: AttachmentId,
    /// The file contents and metadata.
    pub file: LocalFile,
}

/// Bytes sent so far out of the request total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes handed to the transport so far.
    pub loaded: u64,
    /// Total bytes of every part.
    pub total: u64,
}

impl UploadProgress {
    /// Whole percent, `0..=100`. An empty body counts as done.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = self.loaded.min(self.total) * 100 / self.total;
        pct as u8
    }
}

/// Events of one upload: any number of progress ticks, then one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadEvent {
    /// Bytes sent so far.
    Progress(UploadProgress),
    /// The server answered. On status 200 `ids` maps client ids to server ids.
    Response {
        /// HTTP status of the upload response.
        status: u16,
        /// Reason phrase for `status`.
        status_text: String,
        /// Client id to server id, empty unless `status` is 200.
        ids: HashMap<AttachmentId, AttachmentId>,
    },
}

/// Events of one upload, ending with [`UploadEvent::Response`].
pub type UploadEventStream = Pin<Box<dyn Stream<Item = Result<UploadEvent, TransportError>> + Send>>;

/// Chunked upload and download of binary attachments.
#[async_trait]
pub trait AttachmentTransport: Send + Sync {
    /// Start a multipart upload. The stream ends after the response event or
    /// the first error.
    fn upload(&self, parts: Vec<UploadPart>) -> UploadEventStream;

    /// Fetch an attachment's bytes.
    async fn download(&self, attachment: &Attachment) -> Result<Bytes, TransportError>;
}

/// Older messages for backfill.
#[async_trait]
pub trait HistoryFetcher: Send + Sync {
    /// The ordered page of messages strictly preceding `anchor` (possibly empty).
    async fn fetch_before(&self, anchor: &MessageId) -> Result<Vec<InboundEvent>, TransportError>;
}

/// Renditions already available for a video attachment.
#[async_trait]
pub trait VideoSourceFetcher: Send + Sync {
    /// Renditions the server has produced so far.
    async fn video_sources(&self, attachment: &Attachment) -> Result<CompoundWebVideo, TransportError>;
}
