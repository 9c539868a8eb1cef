//! User-facing notifications.

use orion_core::{Attachment, TransportError};

/// A recoverable failure the view should show as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// An attachment could not be downloaded.
    DownloadFailed {
        /// HTTP status, `0` when no response arrived.
        status: u16,
        /// Reason phrase or error text.
        status_text: String,
        /// Name of the attachment that failed.
        name: String,
    },
}

impl Notice {
    /// Notice for a failed download of `attachment`.
    pub fn download_failed(attachment: &Attachment, error: &TransportError) -> Self {
        Self::DownloadFailed {
            status: error.status(),
            status_text: error.status_text(),
            name: attachment.name.clone(),
        }
    }

    /// Headline, e.g. `Error 404: Not Found`.
    pub fn summary(&self) -> String {
        match self {
            Self::DownloadFailed {
                status,
                status_text,
                ..
            } => format!("Error {status}: {status_text}"),
        }
    }

    /// Body text: the affected file.
    pub fn detail(&self) -> &str {
        match self {
            Self::DownloadFailed { name, .. } => name,
        }
    }
}
