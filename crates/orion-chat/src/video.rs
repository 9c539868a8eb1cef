//! Per-attachment feed of playable video renditions.
//!
//! The server transcodes videos in the background and announces new
//! renditions with `videoSource` events. A feed yields what is already
//! available (fetched over HTTP) followed by every live update for the same
//! attachment, ready to hand to a player.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use orion_core::{Attachment, CompoundWebVideo};
use orion_transport::{ConnectionChannel, UrlFactory, VideoSourceFetcher};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

/// Boxed feed of playable renditions.
pub type VideoSourceStream = Pin<Box<dyn Stream<Item = CompoundWebVideo> + Send>>;

/// Builds [`VideoSourceStream`]s.
pub struct VideoSourceFeed;

impl VideoSourceFeed {
    /// Build the feed for one video attachment.
    ///
    /// Live updates are subscribed before the initial fetch starts, so none
    /// are missed while it is in flight. Source lists that are still empty
    /// are skipped. The feed ends when the channel closes.
    pub fn for_attachment(
        channel: &ConnectionChannel,
        fetcher: Arc<dyn VideoSourceFetcher>,
        urls: &UrlFactory,
        attachment: &Attachment,
    ) -> VideoSourceStream {
        let live = BroadcastStream::new(channel.subscribe());
        let token = channel.cancellation();
        let target = attachment.file_id.clone();

        let initial_attachment = attachment.clone();
        let initial = futures::stream::once(async move {
            match fetcher.video_sources(&initial_attachment).await {
                Ok(video) => Some(video),
                Err(e) => {
                    warn!(file_id = %initial_attachment.file_id, error = %e, "video sources unavailable");
                    None
                }
            }
        });

        let updates = live.filter_map(move |item| {
            let target = target.clone();
            async move {
                let event = match item {
                    Ok(event) => event,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "video feed lagged behind inbound stream");
                        return None;
                    }
                };
                match event.video_source()? {
                    Ok(update) if update.attachment_id == target => Some(Some(update.compound_web_video)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(id = %event.id, error = %e, "dropping undecodable video source");
                        None
                    }
                }
            }
        });

        let urls = urls.clone();
        let attachment = attachment.clone();
        let feed = initial
            .chain(updates)
            .filter_map(move |video| {
                let prepared = video.and_then(|v| prepare(v, &urls, &attachment));
                async move { prepared }
            })
            .take_until(async move { token.cancelled().await });
        Box::pin(feed)
    }
}

/// Make sources playable and label the video; `None` while it has no sources.
fn prepare(mut video: CompoundWebVideo, urls: &UrlFactory, attachment: &Attachment) -> Option<CompoundWebVideo> {
    if video.sources.is_empty() {
        debug!(file_id = %attachment.file_id, "video has no renditions yet");
        return None;
    }
    for source in &mut video.sources {
        source.src = urls.stream_src(&source.src);
    }
    video.title = Some(attachment.name.clone());
    video.poster = urls.thumb_url(attachment);
    Some(video)
}
