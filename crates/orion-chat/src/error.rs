//! Chat-level errors surfaced to the hosting view.

use orion_core::{AttachmentId, TransportError};

/// Errors returned by [`ChatHandle`](crate::ChatHandle) operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The connection rejected the frame.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The upload failed or the server rejected it. Nothing was sent.
    #[error("upload failed: {0}")]
    Upload(TransportError),

    /// The server accepted the upload but did not return an id for every file.
    #[error("upload response has no server id for {missing:?}")]
    UploadIncomplete {
        /// Client ids with no server id.
        missing: Vec<AttachmentId>,
    },

    /// The orchestrator loop has exited (the channel was closed).
    #[error("chat session has stopped")]
    Stopped,
}

impl ChatError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.error_kind(),
            Self::Upload(_) => "upload_failed",
            Self::UploadIncomplete { .. } => "upload_incomplete",
            Self::Stopped => "stopped",
        }
    }
}
