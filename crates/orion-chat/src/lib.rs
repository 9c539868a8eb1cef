//! # orion-chat
//!
//! The reactive core of the chat surface. One [`ChatOrchestrator`] task
//! consumes the hot inbound stream of a
//! [`ConnectionChannel`](orion_transport::ConnectionChannel) and maintains:
//!
//! - the message timeline, batched into 600 ms render passes
//! - the participant list (roster + typing), sampled every 700 ms
//! - history backfill when the view reaches the top, one fetch at a time
//! - debounced nick changes
//!
//! A [`ChatHandle`] is the view's side of the session: it sends messages
//! (uploading attachments with throttled progress), downloads attachments,
//! forwards scroll and nick input, and exposes every derived state as a
//! `watch` signal.

#![deny(unsafe_code)]

pub mod dispatch;
pub mod error;
pub mod notice;
pub mod operators;
pub mod orchestrator;
pub mod roster;
pub mod services;
pub mod timeline;
pub mod video;
pub mod viewport;

pub use dispatch::OutgoingComposite;
pub use error::ChatError;
pub use notice::Notice;
pub use orchestrator::{BackfillState, ChatDeps, ChatHandle, ChatOrchestrator};
pub use roster::merge_participants;
pub use services::{SnapshotService, TypingService};
pub use timeline::{SpliceOutcome, Timeline};
pub use video::{VideoSourceFeed, VideoSourceStream};
pub use viewport::{NoopViewport, ScrollGeometry, ViewportError, ViewportPort};
