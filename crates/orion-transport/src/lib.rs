//! # orion-transport
//!
//! The I/O edges of the chat client:
//!
//! - [`ConnectionChannel`]: the one persistent WebSocket, fanned out as a hot
//!   broadcast of [`InboundEvent`](orion_core::InboundEvent)s. Closing it is
//!   the single cancellation root for everything derived from it.
//! - [`AttachmentTransport`], [`HistoryFetcher`], [`VideoSourceFetcher`]:
//!   HTTP collaborators, with reqwest-backed implementations in [`http`].
//! - [`UrlFactory`] / [`ThumbKind`]: endpoint and thumbnail URL building.

#![deny(unsafe_code)]

pub mod channel;
pub mod file;
pub mod http;
pub mod ports;
pub mod urls;
mod websocket;

pub use channel::{ConnectionChannel, LoopbackPeer};
pub use file::LocalFile;
pub use http::{HttpAttachmentTransport, HttpHistoryFetcher, HttpVideoSourceFetcher};
pub use ports::{
    AttachmentTransport, HistoryFetcher, UploadEvent, UploadEventStream, UploadPart,
    UploadProgress, VideoSourceFetcher,
};
pub use urls::{ThumbKind, UrlFactory};
