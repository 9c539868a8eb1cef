//! WebSocket backing for [`ConnectionChannel`]: one reader task decoding
//! frames into the broadcast, one writer task draining the outbound queue.

use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use orion_core::{EventType, InboundEvent, OutboundFrame, TransportError};
use orion_settings::ChannelSettings;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, trace, warn};

use crate::channel::{ConnectionChannel, Inner};

/// Payload of the internal marker published when the socket opens.
pub(crate) const CONNECTED_MARKER: &str = "connected";

pub(crate) async fn open(
    url: &str,
    settings: &ChannelSettings,
) -> Result<ConnectionChannel, TransportError> {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;
    info!(url, "websocket connected");

    let (channel, outbound) = ConnectionChannel::with_parts(url, settings);
    let inner = channel.inner();
    let _ = inner
        .publish(InboundEvent::internal(EventType::Info, CONNECTED_MARKER))
        .await;

    let (ws_tx, ws_rx) = socket.split();
    let _writer = tokio::spawn(run_writer(ws_tx, outbound, Arc::clone(&inner)));
    let _reader = tokio::spawn(run_reader(ws_rx, inner));
    Ok(channel)
}

/// Forward queued frames to the socket until the channel closes.
async fn run_writer<S>(mut ws_tx: S, mut outbound: mpsc::Receiver<OutboundFrame>, inner: Arc<Inner>)
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let token = inner.token().clone();
    loop {
        tokio::select! {
            () = token.cancelled() => {
                let _ = ws_tx.send(WsMessage::Close(None)).await;
                break;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "dropping unserializable outbound frame");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                    warn!(channel = inner.label(), error = %e, "websocket write failed");
                    break;
                }
                trace!(channel = inner.label(), "frame written");
            }
        }
    }
    inner.shutdown();
}

/// Decode inbound text frames exactly once and publish them in arrival order.
async fn run_reader<S>(mut ws_rx: S, inner: Arc<Inner>)
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let token = inner.token().clone();
    loop {
        let msg = tokio::select! {
            () = token.cancelled() => break,
            msg = ws_rx.next() => msg,
        };
        match msg {
            Some(Ok(WsMessage::Text(text))) => match InboundEvent::from_json(text.as_str()) {
                Ok(event) => {
                    debug!(id = %event.id, kind = %event.kind, "inbound event");
                    if !inner.publish(event).await {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "dropping malformed inbound frame"),
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                info!(channel = inner.label(), "websocket closed by peer");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(channel = inner.label(), error = %e, "websocket read failed");
                break;
            }
        }
    }
    inner.shutdown();
}
