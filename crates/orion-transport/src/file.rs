//! Raw local files chosen for upload.

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use orion_core::TransportError;

/// A file picked by the user, before it becomes an [`Attachment`](orion_core::Attachment).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    /// File name as picked by the user.
    pub name: String,
    /// Length of `data` in bytes.
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    /// Mime type, empty when unknown.
    pub mime_type: String,
    /// Raw contents.
    pub data: Bytes,
}

impl LocalFile {
    /// Wrap in-memory contents; `size` is taken from `data`.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        last_modified: i64,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            last_modified,
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Read a file from disk. The mime type comes from the caller (the view
    /// layer already knows it from the picker).
    pub async fn read(path: &Path, mime_type: impl Into<String>) -> Result<Self, TransportError> {
        let io_err = |e: std::io::Error| TransportError::Network(format!("{}: {e}", path.display()));
        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        let data = tokio::fs::read(path).await.map_err(io_err)?;
        let last_modified = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, last_modified, data))
    }
}
