//! The persistent bidirectional connection.
//!
//! Inbound frames are decoded once and fanned out, so every subscriber
//! observes the same hot stream in arrival order without re-running the
//! producer. There are two kinds of subscriber:
//!
//! - **ordered** ([`ConnectionChannel::subscribe_ordered`]): a bounded queue
//!   per subscriber that publishing waits on. Nothing is ever dropped; a slow
//!   consumer slows the reader (and so the socket) down instead.
//! - **broadcast** ([`ConnectionChannel::subscribe`]): a shared ring buffer.
//!   A subscriber that falls more than `inbound_capacity` events behind skips
//!   ahead. Meant for listeners that only care about recent events.
//!
//! The first subscription of each kind receives a queue created when the
//! channel opened, so nothing published before it is lost.
//!
//! Closing the channel cancels the root [`CancellationToken`] and drops every
//! sender: each subscriber drains what was already queued, then sees
//! end-of-stream, and every task holding a token from
//! [`ConnectionChannel::cancellation`] stops.

use std::sync::Arc;

use orion_core::{InboundEvent, OutboundFrame, ProfileUpdate, RichMessage, TransportError};
use orion_settings::ChannelSettings;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) struct Inner {
    label: String,
    inbound: Mutex<Option<broadcast::Sender<InboundEvent>>>,
    primed: Mutex<Option<broadcast::Receiver<InboundEvent>>>,
    ordered: Mutex<Vec<mpsc::Sender<InboundEvent>>>,
    primed_ordered: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    ordered_capacity: usize,
    outbound: mpsc::Sender<OutboundFrame>,
    token: CancellationToken,
}

impl Inner {
    /// Publish to all current subscribers, waiting while any ordered
    /// subscriber's queue is full. Returns `false` once closed.
    pub(crate) async fn publish(&self, event: InboundEvent) -> bool {
        let ordered = self.ordered.lock().clone();
        {
            let inbound = self.inbound.lock();
            let Some(tx) = inbound.as_ref() else {
                return false;
            };
            // Err only means nobody is subscribed right now
            let _ = tx.send(event.clone());
        }
        for tx in ordered {
            tokio::select! {
                biased;
                sent = tx.send(event.clone()) => {
                    if sent.is_err() {
                        self.ordered.lock().retain(|tx| !tx.is_closed());
                    }
                }
                () = self.token.cancelled() => return false,
            }
        }
        true
    }

    pub(crate) fn shutdown(&self) {
        self.token.cancel();
        let _ = self.inbound.lock().take();
        let _ = self.primed.lock().take();
        self.ordered.lock().clear();
        let _ = self.primed_ordered.lock().take();
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

/// Handle to the one persistent connection. Cheap to clone; all clones share
/// the same lifecycle.
#[derive(Clone)]
pub struct ConnectionChannel {
    inner: Arc<Inner>,
}

impl ConnectionChannel {
    pub(crate) fn with_parts(
        label: impl Into<String>,
        settings: &ChannelSettings,
    ) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let capacity = settings.inbound_capacity.max(1);
        let (inbound_tx, primed_rx) = broadcast::channel(capacity);
        let (ordered_tx, ordered_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_capacity.max(1));
        let inner = Inner {
            label: label.into(),
            inbound: Mutex::new(Some(inbound_tx)),
            primed: Mutex::new(Some(primed_rx)),
            ordered: Mutex::new(vec![ordered_tx]),
            primed_ordered: Mutex::new(Some(ordered_rx)),
            ordered_capacity: capacity,
            outbound: outbound_tx,
            token: CancellationToken::new(),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            outbound_rx,
        )
    }

    pub(crate) fn inner(&self) -> Arc<Inner> {
        Arc::clone(&self.inner)
    }

    /// Open a WebSocket connection to `url`.
    pub async fn connect(url: &str, settings: &ChannelSettings) -> Result<Self, TransportError> {
        crate::websocket::open(url, settings).await
    }

    /// An in-memory channel driven by the returned [`LoopbackPeer`].
    pub fn loopback(settings: &ChannelSettings) -> (Self, LoopbackPeer) {
        let (channel, outbound) = Self::with_parts("loopback", settings);
        let peer = LoopbackPeer {
            inner: channel.inner(),
            outbound,
        };
        (channel, peer)
    }

    /// Subscribe to the broadcast of inbound events. A subscriber that falls
    /// too far behind receives `Lagged` and skips ahead.
    ///
    /// After close the returned receiver is already terminated.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        if let Some(rx) = self.inner.primed.lock().take() {
            return rx;
        }
        match self.inner.inbound.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (_tx, rx) = broadcast::channel(1);
                rx
            }
        }
    }

    /// Subscribe to inbound events without loss.
    ///
    /// Until the first ordered subscriber takes its queue, publishing waits
    /// once `inbound_capacity` events are buffered. After close the returned
    /// receiver is already terminated.
    pub fn subscribe_ordered(&self) -> mpsc::Receiver<InboundEvent> {
        if let Some(rx) = self.inner.primed_ordered.lock().take() {
            return rx;
        }
        let mut ordered = self.inner.ordered.lock();
        if self.inner.token.is_cancelled() {
            let (_tx, rx) = mpsc::channel(1);
            return rx;
        }
        let (tx, rx) = mpsc::channel(self.inner.ordered_capacity);
        ordered.push(tx);
        rx
    }

    /// Enqueue an outbound frame for the writer.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        if self.inner.token.is_cancelled() {
            return Err(TransportError::ConnectionClosed);
        }
        debug!(kind = ?frame.kind, "enqueue outbound frame");
        self.inner.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TransportError::ConnectionClosed,
        })
    }

    /// Send a plain text message.
    pub fn send_msg(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(OutboundFrame::msg(text))
    }

    /// Send a message carrying attachments.
    pub fn send_rich_msg(&self, message: &RichMessage) -> Result<(), TransportError> {
        self.send(OutboundFrame::rich_msg(message)?)
    }

    /// "User is typing" pulse.
    pub fn send_set_typing(&self) -> Result<(), TransportError> {
        self.send(OutboundFrame::set_typing())
    }

    /// Notify peers that our profile (nick) changed.
    pub fn send_update_me(&self, nick: impl Into<String>) -> Result<(), TransportError> {
        self.send(OutboundFrame::update_me(&ProfileUpdate { nick: nick.into() })?)
    }

    /// Terminate the connection and every subscription derived from it.
    /// Idempotent.
    pub fn close(&self) {
        if !self.inner.token.is_cancelled() {
            info!(channel = %self.inner.label, "closing connection");
        }
        self.inner.shutdown();
    }

    /// Whether [`close`](Self::close) has run or the transport dropped.
    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// A child token cancelled when the channel closes.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Resolves once the channel is closed.
    pub async fn closed(&self) {
        self.inner.token.cancelled().await;
    }
}

impl std::fmt::Debug for ConnectionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionChannel")
            .field("label", &self.inner.label)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// The far end of a [`ConnectionChannel::loopback`] channel.
pub struct LoopbackPeer {
    inner: Arc<Inner>,
    outbound: mpsc::Receiver<OutboundFrame>,
}

impl LoopbackPeer {
    /// Deliver an inbound event, waiting while an ordered subscriber is
    /// full. Returns `false` once the channel is closed.
    pub async fn push(&self, event: InboundEvent) -> bool {
        self.inner.publish(event).await
    }

    /// Next frame the client sent, or `None` once the channel is closed and
    /// drained.
    pub async fn next_outbound(&mut self) -> Option<OutboundFrame> {
        tokio::select! {
            biased;
            frame = self.outbound.recv() => frame,
            () = self.inner.token.cancelled() => self.outbound.try_recv().ok(),
        }
    }

    /// A frame the client already sent, without waiting.
    pub fn try_outbound(&mut self) -> Option<OutboundFrame> {
        self.outbound.try_recv().ok()
    }

    /// Everything sent so far.
    pub fn drain_outbound(&mut self) -> Vec<OutboundFrame> {
        std::iter::from_fn(|| self.outbound.try_recv().ok()).collect()
    }

    /// Simulate the transport dropping underneath the client.
    pub fn drop_transport(&self) {
        info!(channel = %self.inner.label, "loopback transport dropped");
        self.inner.shutdown();
    }
}
