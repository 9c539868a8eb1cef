//! # orion-core
//!
//! Shared vocabulary for the Orion chat client crates.
//!
//! - **Envelope**: [`InboundEvent`] and [`OutboundFrame`], the JSON frames that
//!   travel over the persistent connection
//! - **Models**: attachments, roster entries, rich messages, video sources
//! - **Branded IDs**: [`MessageId`], [`ClientId`], [`AttachmentId`] and the
//!   [`IdFactory`] used to mint attachment ids before upload
//! - **Errors**: [`TransportError`] shared by every transport
//! - **Logging**: [`logging::init_subscriber`]

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod models;

pub use envelope::{CLEAR_CHAT_COMMAND, EventType, InboundEvent, OutboundFrame, OutboundKind};
pub use errors::TransportError;
pub use ids::{AttachmentId, ClientId, IdFactory, MessageId, UuidFactory};
pub use models::{
    Attachment, ClientEntry, CompoundWebVideo, Participant, ProfileUpdate, RichMessage,
    TypingMap, VideoSource, VideoSourceUpdate,
};
