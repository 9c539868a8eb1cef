//! Endpoint URLs and thumbnail classification.

use orion_core::{Attachment, MessageId};
use orion_settings::ServerSettings;

/// Thumbnail family of an attachment, derived from its mime type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbKind {
    /// Any `video/*` type.
    Video,
    /// `image/bmp`.
    Bmp,
    /// `image/jpeg`.
    Jpeg,
    /// `image/png`.
    Png,
    /// `image/gif`.
    Gif,
    /// `image/tiff`.
    Tiff,
    /// `application/pdf`.
    Pdf,
}

const SUFFIX_KINDS: [(&str, ThumbKind); 6] = [
    ("bmp", ThumbKind::Bmp),
    ("jpeg", ThumbKind::Jpeg),
    ("png", ThumbKind::Png),
    ("gif", ThumbKind::Gif),
    ("tiff", ThumbKind::Tiff),
    ("pdf", ThumbKind::Pdf),
];

impl ThumbKind {
    /// `video*` mime types are videos; otherwise exactly one known suffix must
    /// match, else there is no thumbnail.
    pub fn classify(mime_type: &str) -> Option<Self> {
        if mime_type.starts_with("video") {
            return Some(Self::Video);
        }
        let mut matches = SUFFIX_KINDS
            .iter()
            .filter(|(suffix, _)| mime_type.ends_with(suffix))
            .map(|(_, kind)| *kind);
        match (matches.next(), matches.next()) {
            (Some(kind), None) => Some(kind),
            _ => None,
        }
    }

    /// Path segment used in thumbnail URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Bmp => "bmp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Pdf => "pdf",
        }
    }
}

/// Builds every HTTP endpoint the client talks to.
#[derive(Clone, Debug)]
pub struct UrlFactory {
    base: String,
    server: ServerSettings,
}

impl UrlFactory {
    /// Build from server settings; a trailing `/` on the base URL is ignored.
    pub fn new(server: &ServerSettings) -> Self {
        Self {
            base: server.base_url.trim_end_matches('/').to_string(),
            server: server.clone(),
        }
    }

    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Multipart upload endpoint.
    pub fn upload_url(&self) -> String {
        self.join(&self.server.upload_path)
    }

    /// Where the bytes of `attachment` are served.
    pub fn download_url(&self, attachment: &Attachment) -> String {
        format!("{}{}", self.join(&self.server.download_path), attachment.file_id)
    }

    /// History page of messages older than `anchor`.
    pub fn history_url(&self, anchor: &MessageId) -> String {
        format!("{}{}", self.join(&self.server.history_path), anchor)
    }

    /// Root of all thumbnail URLs.
    pub fn thumbs_url(&self) -> String {
        self.join(&self.server.thumbs_path)
    }

    /// `{thumbs}{kind}/{fileId}`, or `None` when the attachment has no thumbnail.
    pub fn thumb_url(&self, attachment: &Attachment) -> Option<String> {
        let kind = ThumbKind::classify(&attachment.mime_type)?;
        Some(format!(
            "{}{}/{}",
            self.thumbs_url(),
            kind.as_str(),
            attachment.file_id
        ))
    }

    /// Renditions already produced for a video attachment.
    pub fn video_sources_url(&self, attachment: &Attachment) -> String {
        format!(
            "{}{}",
            self.join(&self.server.video_sources_path),
            attachment.file_id
        )
    }

    /// Root that relative rendition `src` values resolve against.
    pub fn video_streams_url(&self) -> String {
        self.join(&self.server.video_streams_path)
    }

    /// Make a rendition `src` playable by prefixing the streams endpoint.
    pub fn stream_src(&self, src: &str) -> String {
        format!("{}{}", self.video_streams_url(), src.trim_start_matches('/'))
    }
}
