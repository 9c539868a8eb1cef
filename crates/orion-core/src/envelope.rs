//! Wire envelope exchanged over the persistent connection.
//!
//! Inbound frames look like `{"id": "...", "type": "...", "payload": "..."}`.
//! The payload is always a string; for some types it is itself JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::ids::MessageId;
use crate::models::{ProfileUpdate, RichMessage, VideoSourceUpdate};

/// Payload of the local control command that empties the timeline.
pub const CLEAR_CHAT_COMMAND: &str = "clearChatAppender";

/// Inbound event type. Unknown types decode to [`EventType::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// Plain text message.
    Msg,
    /// Message with attachments.
    RichMsg,
    /// Informational line.
    Info,
    /// Control command.
    Command,
    /// The set of clients currently typing.
    TypingSet,
    /// New rendition of a video attachment.
    VideoSource,
    /// Full roster snapshot.
    ClientList,
    /// One client changed its nick.
    NickUpdate,
    /// Any type this client does not know.
    Other(String),
}

impl EventType {
    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Msg => "msg",
            Self::RichMsg => "richMsg",
            Self::Info => "info",
            Self::Command => "command",
            Self::TypingSet => "typingSet",
            Self::VideoSource => "videoSource",
            Self::ClientList => "clientList",
            Self::NickUpdate => "nickUpdate",
            Self::Other(s) => s,
        }
    }

    /// Types rendered in the message timeline.
    pub fn is_timeline(&self) -> bool {
        matches!(self, Self::Msg | Self::RichMsg | Self::Info)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "msg" => Self::Msg,
            "richMsg" => Self::RichMsg,
            "info" => Self::Info,
            "command" => Self::Command,
            "typingSet" => Self::TypingSet,
            "videoSource" => Self::VideoSource,
            "clientList" => Self::ClientList,
            "nickUpdate" => Self::NickUpdate,
            _ => Self::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single frame received from the server, or synthesized locally with the
/// `"internal"` id. Immutable once received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Server message id, or the internal sentinel.
    pub id: MessageId,
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventType,
    /// Raw payload, JSON-encoded for structured types.
    #[serde(default)]
    pub payload: String,
}

impl InboundEvent {
    /// Event with the given id, type and payload.
    pub fn new(id: impl Into<MessageId>, kind: EventType, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            payload: payload.into(),
        }
    }

    /// A locally synthesized event carrying the sentinel id.
    pub fn internal(kind: EventType, payload: impl Into<String>) -> Self {
        Self::new(MessageId::internal(), kind, payload)
    }

    /// The `clearChatAppender` control command.
    pub fn clear_chat() -> Self {
        Self::internal(EventType::Command, CLEAR_CHAT_COMMAND)
    }

    /// Whether this was synthesized locally.
    pub fn is_internal(&self) -> bool {
        self.id.is_internal()
    }

    /// Whether this belongs in the message timeline.
    pub fn is_timeline(&self) -> bool {
        self.kind.is_timeline()
    }

    /// Whether this is the internal command that resets the timeline.
    pub fn is_clear_command(&self) -> bool {
        self.is_internal() && self.kind == EventType::Command && self.payload == CLEAR_CHAT_COMMAND
    }

    /// Decode a JSON-encoded payload.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.payload)
            .map_err(|e| TransportError::decode(format!("{} payload", self.kind), e))
    }

    /// Decode a `videoSource` payload; `None` for other event types.
    pub fn video_source(&self) -> Option<Result<VideoSourceUpdate, TransportError>> {
        (self.kind == EventType::VideoSource).then(|| self.decode_payload())
    }

    /// Parse one text frame from the wire.
    pub fn from_json(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::decode("inbound frame", e))
    }
}

/// Outbound frame type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutboundKind {
    /// Plain text message.
    Msg,
    /// Text plus attachments.
    RichMsg,
    /// "User is typing" pulse.
    SetTyping,
    /// Profile (nick) update.
    UpdateMe,
}

/// A frame sent to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Frame type.
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    /// Text, or a JSON-encoded payload.
    pub payload: String,
}

impl OutboundFrame {
    /// Plain text message.
    pub fn msg(text: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Msg,
            payload: text.into(),
        }
    }

    /// Message with attachments.
    pub fn rich_msg(message: &RichMessage) -> Result<Self, TransportError> {
        let payload =
            serde_json::to_string(message).map_err(|e| TransportError::decode("rich message", e))?;
        Ok(Self {
            kind: OutboundKind::RichMsg,
            payload,
        })
    }

    /// Typing pulse.
    pub fn set_typing() -> Self {
        Self {
            kind: OutboundKind::SetTyping,
            payload: String::new(),
        }
    }

    /// Profile update.
    pub fn update_me(profile: &ProfileUpdate) -> Result<Self, TransportError> {
        let payload =
            serde_json::to_string(profile).map_err(|e| TransportError::decode("profile", e))?;
        Ok(Self {
            kind: OutboundKind::UpdateMe,
            payload,
        })
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::decode("outbound frame", e))
    }
}
