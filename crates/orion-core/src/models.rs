//! Payload models carried inside the envelope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AttachmentId, ClientId};

/// Roster record as published by the server in `clientList` / `nickUpdate`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEntry {
    /// Server-assigned id.
    pub client_id: ClientId,
    /// Display name.
    pub nick: String,
}

/// Roster entry as presented to the view. `is_typing` is derived when the
/// roster and typing map are merged; it is never stored on [`ClientEntry`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Server-assigned id.
    pub client_id: ClientId,
    /// Display name.
    pub nick: String,
    /// Whether a typing pulse is live for this client.
    pub is_typing: bool,
}

/// Client id → when its typing pulse was last seen.
pub type TypingMap = HashMap<ClientId, DateTime<Utc>>;

/// File metadata embedded in rich messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Client-generated before upload, server-issued afterwards.
    pub file_id: AttachmentId,
    /// Original file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    /// Mime type.
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl Attachment {
    /// Whether this is a `video/*` attachment.
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video")
    }
}

/// Payload of a `richMsg` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichMessage {
    /// Text body.
    pub message: String,
    /// Uploaded attachments, with server-issued ids.
    pub attachments: Vec<Attachment>,
}

/// Payload of an `updateMe` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New display name.
    pub nick: String,
}

/// One playable rendition of a video attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    /// Stream path, relative to the video streams root.
    pub src: String,
    /// Container mime type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Vertical resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
}

/// The set of renditions the server has produced for a video so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundWebVideo {
    /// Renditions produced so far.
    #[serde(default)]
    pub sources: Vec<VideoSource>,
    /// Player title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Poster image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

/// Payload of a `videoSource` event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSourceUpdate {
    /// The video attachment this update is for.
    pub attachment_id: AttachmentId,
    /// Its renditions.
    pub compound_web_video: CompoundWebVideo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_list_payload_shape() {
        let entries: Vec<ClientEntry> =
            serde_json::from_str(r#"[{"clientId":"c1","nick":"amy"},{"clientId":"c2","nick":"bob"}]"#)
                .unwrap();
        assert_eq!(entries[1].nick, "bob");
        assert_eq!(entries[0].client_id, ClientId::from("c1"));
    }

    #[test]
    fn attachment_wire_names() {
        let json = r#"{"fileId":"a1","name":"clip.mp4","size":10,"lastModified":5,"type":"video/mp4"}"#;
        let a: Attachment = serde_json::from_str(json).unwrap();
        assert!(a.is_video());
        assert_eq!(serde_json::to_string(&a).unwrap(), json);
    }

    #[test]
    fn compound_video_tolerates_missing_sources() {
        let v: CompoundWebVideo = serde_json::from_str("{}").unwrap();
        assert!(v.sources.is_empty());
    }
}
