//! The chat orchestrator: one task that owns the timeline and drives every
//! timing policy from a single `select!` loop.
//!
//! ```text
//!   ConnectionChannel ──ordered────▶ ChatOrchestrator::run
//!   ChatHandle ─────────commands───▶   ├─ SnapshotService / TypingService
//!   history fetch task ─completion─▶   ├─ BatchWindow ─▶ timeline watch
//!                                      ├─ Sampler ─────▶ participants watch
//!                                      ├─ Debouncer ───▶ ExhaustGate ─▶ history fetch
//!                                      └─ Debouncer ───▶ updateMe
//! ```
//!
//! Spawned I/O never touches loop state; it reports back through the
//! completion queue. The inbound queue is lossless: a slow loop holds the
//! socket reader back instead of dropping events. Closing the channel ends
//! the inbound stream, which ends the loop and cancels every task holding a
//! child token.

use std::sync::Arc;

use bytes::Bytes;
use orion_core::{
    Attachment, ClientEntry, IdFactory, InboundEvent, MessageId, Participant, RichMessage,
    TransportError, TypingMap, UuidFactory,
};
use orion_settings::{ChatSettings, TimingSettings};
use orion_transport::{
    AttachmentTransport, ConnectionChannel, HistoryFetcher, HttpAttachmentTransport,
    HttpHistoryFetcher, HttpVideoSourceFetcher, UrlFactory, VideoSourceFetcher,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::dispatch::{self, OutgoingComposite};
use crate::error::ChatError;
use crate::notice::Notice;
use crate::operators::{BatchWindow, Debouncer, ExhaustGate, Sampler, sleep_until_opt};
use crate::roster::merge_participants;
use crate::services::{SnapshotService, TypingService};
use crate::timeline::{SpliceOutcome, Timeline};
use crate::video::{VideoSourceFeed, VideoSourceStream};
use crate::viewport::{ScrollGeometry, ViewportPort};

const NOTICE_CAPACITY: usize = 64;

/// Where history backfill stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackfillState {
    /// No history request outstanding.
    #[default]
    Idle,
    /// Fetching the page before `anchor`.
    FetchInFlight {
        /// Oldest server message when the fetch started.
        anchor: MessageId,
    },
}

/// Collaborators wired into a chat session.
pub struct ChatDeps {
    /// The persistent connection.
    pub channel: ConnectionChannel,
    /// Upload and download.
    pub attachments: Arc<dyn AttachmentTransport>,
    /// Older message pages.
    pub history: Arc<dyn HistoryFetcher>,
    /// Renditions of video attachments.
    pub videos: Arc<dyn VideoSourceFetcher>,
    /// The rendering surface.
    pub viewport: Arc<dyn ViewportPort>,
    /// Mints attachment ids before upload.
    pub ids: Arc<dyn IdFactory>,
    /// Endpoint URLs.
    pub urls: UrlFactory,
}

impl ChatDeps {
    /// Connect to the configured server and wire the HTTP transports.
    pub async fn connect(settings: &ChatSettings, viewport: Arc<dyn ViewportPort>) -> Result<Self, ChatError> {
        let channel = ConnectionChannel::connect(&settings.server.ws_url, &settings.channel).await?;
        Ok(Self {
            channel,
            attachments: Arc::new(HttpAttachmentTransport::new(&settings.server)?),
            history: Arc::new(HttpHistoryFetcher::new(&settings.server)?),
            videos: Arc::new(HttpVideoSourceFetcher::new(&settings.server)?),
            viewport,
            ids: Arc::new(UuidFactory),
            urls: UrlFactory::new(&settings.server),
        })
    }
}

enum Command {
    Scroll { top: u32, fixed_scroll: Option<bool> },
    SetFixedScroll(bool),
    NickInput(String),
}

struct HistoryPage {
    anchor: MessageId,
    result: Result<Vec<InboundEvent>, TransportError>,
}

/// Read side shared by the loop and every handle.
struct Signals {
    timeline: watch::Sender<Vec<InboundEvent>>,
    participants: watch::Sender<Vec<Participant>>,
    upload_progress: watch::Sender<Option<u8>>,
    identity: watch::Sender<Option<String>>,
    backfill: watch::Sender<BackfillState>,
    notices: broadcast::Sender<Notice>,
    clients: watch::Receiver<Vec<ClientEntry>>,
    typing: watch::Receiver<TypingMap>,
}

/// Owns all mutable chat state. Consumed by [`run`](Self::run).
pub struct ChatOrchestrator {
    channel: ConnectionChannel,
    inbound: mpsc::Receiver<InboundEvent>,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::Sender<HistoryPage>,
    completions: mpsc::Receiver<HistoryPage>,
    history: Arc<dyn HistoryFetcher>,
    viewport: Arc<dyn ViewportPort>,
    signals: Arc<Signals>,
    timing: TimingSettings,
    token: CancellationToken,

    snapshot: SnapshotService,
    typing: TypingService,
    timeline: Timeline,
    batch: BatchWindow<InboundEvent>,
    roster_sampler: Sampler<Vec<Participant>>,
    scroll_debounce: Debouncer<u32>,
    backfill: ExhaustGate<MessageId>,
    nick_debounce: Debouncer<String>,
    last_nick: Option<String>,
    fixed_scroll: bool,
}

impl ChatOrchestrator {
    /// Build the orchestrator and its handle. Subscribes to the channel
    /// immediately so no inbound event is missed before [`run`](Self::run).
    pub fn new(deps: ChatDeps, settings: &ChatSettings) -> (Self, ChatHandle) {
        let ChatDeps {
            channel,
            attachments,
            history,
            videos,
            viewport,
            ids,
            urls,
        } = deps;

        let inbound = channel.subscribe_ordered();
        let (commands_tx, commands) = mpsc::channel(settings.channel.command_capacity.max(1));
        let (completions_tx, completions) = mpsc::channel(1);

        let snapshot = SnapshotService::new();
        let typing = TypingService::new();
        let signals = Arc::new(Signals {
            timeline: watch::channel(Vec::new()).0,
            participants: watch::channel(Vec::new()).0,
            upload_progress: watch::channel(None).0,
            identity: watch::channel(None).0,
            backfill: watch::channel(BackfillState::Idle).0,
            notices: broadcast::channel(NOTICE_CAPACITY).0,
            clients: snapshot.clients_list(),
            typing: typing.typing_map(),
        });
        let timing = settings.timing.clone();

        let handle = ChatHandle {
            channel: channel.clone(),
            commands: commands_tx,
            attachments,
            videos,
            viewport: Arc::clone(&viewport),
            ids,
            urls,
            signals: Arc::clone(&signals),
            timing: timing.clone(),
        };

        let orchestrator = Self {
            token: channel.cancellation(),
            channel,
            inbound,
            commands,
            completions_tx,
            completions,
            history,
            viewport,
            signals,
            scroll_debounce: Debouncer::new(timing.history_debounce()),
            nick_debounce: Debouncer::new(timing.nick_debounce()),
            timing,
            snapshot,
            typing,
            timeline: Timeline::new(),
            batch: BatchWindow::new(),
            roster_sampler: Sampler::new(),
            backfill: ExhaustGate::new(),
            last_nick: None,
            fixed_scroll: false,
        };
        (orchestrator, handle)
    }

    /// Build and spawn onto the current runtime.
    pub fn spawn(deps: ChatDeps, settings: &ChatSettings) -> (ChatHandle, JoinHandle<()>) {
        let (orchestrator, handle) = Self::new(deps, settings);
        let task = tokio::spawn(orchestrator.run());
        (handle, task)
    }

    /// The event loop. Returns once the inbound stream has ended.
    #[instrument(skip_all, name = "chat_orchestrator")]
    pub async fn run(mut self) {
        let start = Instant::now();
        let batch_period = self.timing.timeline_batch();
        let sample_period = self.timing.roster_sample();
        let mut batch_tick = interval_at(start + batch_period, batch_period);
        batch_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sample_tick = interval_at(start + sample_period, sample_period);
        sample_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // the first sample carries the initial (empty) combination
        self.roster_sampler.offer(self.merged_roster());
        info!(
            batch_ms = self.timing.timeline_batch_ms,
            sample_ms = self.timing.roster_sample_ms,
            "chat orchestrator started"
        );

        loop {
            tokio::select! {
                biased;
                _ = batch_tick.tick() => self.flush_batch(),
                _ = sample_tick.tick() => self.sample_roster(),
                () = sleep_until_opt(self.scroll_debounce.deadline()) => self.settle_scroll(Instant::now()),
                () = sleep_until_opt(self.nick_debounce.deadline()) => self.settle_nick(Instant::now()),
                Some(page) = self.completions.recv() => self.on_history(page),
                Some(command) = self.commands.recv() => self.on_command(command, Instant::now()),
                event = self.inbound.recv() => match event {
                    Some(event) => self.on_inbound(event),
                    None => break,
                },
                () = self.token.cancelled() => {
                    // drain what the channel delivered before it closed
                    while let Ok(event) = self.inbound.try_recv() {
                        self.on_inbound(event);
                    }
                    break;
                }
            }
        }

        if let Some(batch) = self.batch.finish() {
            self.render(batch);
        }
        info!(messages = self.timeline.len(), "chat orchestrator stopped");
    }

    fn merged_roster(&self) -> Vec<Participant> {
        merge_participants(&self.snapshot.snapshot(), &self.typing.snapshot())
    }

    fn on_inbound(&mut self, event: InboundEvent) {
        trace!(id = %event.id, kind = %event.kind, "inbound");
        let roster_changed = self.snapshot.handle(&event);
        let typing_changed = self.typing.handle(&event);
        if roster_changed || typing_changed {
            self.roster_sampler.offer(self.merged_roster());
        }

        if event.is_clear_command() {
            let dropped = self.timeline.len() + self.batch.len();
            self.timeline.clear();
            self.batch.clear();
            self.publish_timeline();
            info!(dropped, "timeline cleared");
            return;
        }

        if event.is_timeline() {
            self.batch.push(event);
        }
    }

    fn flush_batch(&mut self) {
        if let Some(batch) = self.batch.tick() {
            self.render(batch);
        }
    }

    fn render(&mut self, batch: Vec<InboundEvent>) {
        debug!(size = batch.len(), "timeline batch");
        self.timeline.append(batch);
        self.publish_timeline();
        if !self.fixed_scroll {
            let _ = self.viewport.scroll_to_bottom();
        }
    }

    fn publish_timeline(&self) {
        let _ = self.signals.timeline.send_replace(self.timeline.entries().to_vec());
    }

    fn sample_roster(&mut self) {
        if let Some(participants) = self.roster_sampler.tick() {
            debug!(participants = participants.len(), "roster sample");
            let _ = self.signals.participants.send_replace(participants);
        }
    }

    fn on_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Scroll { top, fixed_scroll } => {
                if let Some(fixed) = fixed_scroll {
                    self.fixed_scroll = fixed;
                }
                self.scroll_debounce.push_at(now, top);
            }
            Command::SetFixedScroll(fixed) => self.fixed_scroll = fixed,
            Command::NickInput(text) => self.nick_debounce.push_at(now, text),
        }
    }

    fn settle_scroll(&mut self, now: Instant) {
        let Some(top) = self.scroll_debounce.poll_due(now) else {
            return;
        };
        if top != 0 {
            return;
        }
        let Some(anchor) = self.timeline.oldest_non_internal().cloned() else {
            debug!("at top but no anchor for backfill");
            return;
        };
        if !self.backfill.try_enter(anchor.clone()) {
            debug!(%anchor, "history fetch in flight, trigger dropped");
            return;
        }
        info!(%anchor, "fetching history");
        let _ = self
            .signals
            .backfill
            .send_replace(BackfillState::FetchInFlight { anchor: anchor.clone() });

        let history = Arc::clone(&self.history);
        let completions = self.completions_tx.clone();
        let token = self.token.child_token();
        let _fetch = tokio::spawn(async move {
            let result = tokio::select! {
                () = token.cancelled() => return,
                result = history.fetch_before(&anchor) => result,
            };
            let _ = completions.send(HistoryPage { anchor, result }).await;
        });
    }

    fn on_history(&mut self, page: HistoryPage) {
        let _ = self.backfill.release();
        let _ = self.signals.backfill.send_replace(BackfillState::Idle);
        let HistoryPage { anchor, result } = page;

        let events = match result {
            Ok(events) => events,
            Err(e) => {
                warn!(%anchor, error = %e, "history fetch failed");
                return;
            }
        };
        if events.is_empty() {
            debug!(%anchor, "no older history");
            return;
        }
        match self.timeline.splice_history(&anchor, events) {
            SpliceOutcome::Spliced { inserted, evicted } => {
                debug!(%anchor, inserted, evicted, "history spliced");
                self.publish_timeline();
                let _ = self.viewport.scroll_to_anchor(&anchor);
            }
            SpliceOutcome::Empty => debug!(%anchor, "history page already present"),
            SpliceOutcome::AnchorMissing => warn!(%anchor, "anchor gone, history page dropped"),
        }
    }

    fn settle_nick(&mut self, now: Instant) {
        let Some(nick) = self.nick_debounce.poll_due(now) else {
            return;
        };
        if self.last_nick.as_deref() == Some(nick.as_str()) {
            return;
        }
        self.last_nick = Some(nick.clone());
        if nick.is_empty() {
            return;
        }
        info!(nick = %nick, "nick changed");
        let _ = self.signals.identity.send_replace(Some(nick.clone()));
        if let Err(e) = self.channel.send_update_me(nick) {
            warn!(error = %e, "could not announce nick change");
        }
    }
}

/// Cheap, cloneable front door to a running chat session.
#[derive(Clone)]
pub struct ChatHandle {
    channel: ConnectionChannel,
    commands: mpsc::Sender<Command>,
    attachments: Arc<dyn AttachmentTransport>,
    videos: Arc<dyn VideoSourceFetcher>,
    viewport: Arc<dyn ViewportPort>,
    ids: Arc<dyn IdFactory>,
    urls: UrlFactory,
    signals: Arc<Signals>,
    timing: TimingSettings,
}

impl ChatHandle {
    async fn command(&self, command: Command) -> Result<(), ChatError> {
        self.commands.send(command).await.map_err(|_| ChatError::Stopped)
    }

    /// Send a composed message. Attachments are uploaded first and the rich
    /// message only goes out once every file has a server id.
    #[instrument(skip_all, fields(files = composite.files.len()))]
    pub async fn send_message(&self, composite: OutgoingComposite) -> Result<(), ChatError> {
        let OutgoingComposite { text, files } = composite;
        if files.is_empty() {
            return Ok(self.channel.send_msg(text)?);
        }

        let (attachments, parts) = dispatch::prepare(files, self.ids.as_ref());
        let token = self.channel.cancellation();
        let server_ids = dispatch::run_upload(
            self.attachments.as_ref(),
            parts,
            &self.signals.upload_progress,
            self.timing.upload_progress_throttle(),
            &token,
        )
        .await?;
        let attachments = dispatch::finalize(attachments, &server_ids)?;
        info!(attachments = attachments.len(), "sending rich message");
        Ok(self.channel.send_rich_msg(&RichMessage {
            message: text,
            attachments,
        })?)
    }

    /// Fetch an attachment. Failures become a [`Notice`] and yield `None`.
    pub async fn download_attachment(&self, attachment: &Attachment) -> Option<Bytes> {
        match self.attachments.download(attachment).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(file_id = %attachment.file_id, error = %e, "download failed");
                let _ = self.signals.notices.send(Notice::download_failed(attachment, &e));
                None
            }
        }
    }

    /// Report the view's scroll metrics.
    pub async fn on_scroll(&self, geometry: ScrollGeometry) -> Result<(), ChatError> {
        self.command(Command::Scroll {
            top: geometry.top,
            fixed_scroll: Some(geometry.fixed_scroll()),
        })
        .await
    }

    /// Report a bare scroll offset, for views that track pinning themselves.
    pub async fn on_scroll_offset(&self, top: u32) -> Result<(), ChatError> {
        self.command(Command::Scroll {
            top,
            fixed_scroll: None,
        })
        .await
    }

    /// Pin the view (no auto-scroll) or release it.
    pub async fn set_fixed_scroll(&self, fixed: bool) -> Result<(), ChatError> {
        self.command(Command::SetFixedScroll(fixed)).await
    }

    /// Scroll to the newest message even if the view is pinned.
    pub fn scroll_to_bottom(&self) {
        let _ = self.viewport.scroll_to_bottom();
    }

    /// Raw nick field contents; debounced before anything is sent.
    pub async fn nick_input(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.command(Command::NickInput(text.into())).await
    }

    /// "User is typing" pulse.
    pub fn user_typing(&self) -> Result<(), ChatError> {
        Ok(self.channel.send_set_typing()?)
    }

    /// Live renditions for a video attachment.
    pub fn video_sources(&self, attachment: &Attachment) -> VideoSourceStream {
        VideoSourceFeed::for_attachment(&self.channel, Arc::clone(&self.videos), &self.urls, attachment)
    }

    /// Endpoint URLs, for thumbnails and downloads in the view.
    pub fn urls(&self) -> &UrlFactory {
        &self.urls
    }

    /// Tear the session down. Every stream and task derived from the
    /// connection ends.
    pub fn close(&self) {
        self.channel.close();
    }

    /// The rendered timeline, updated once per batch.
    pub fn timeline(&self) -> watch::Receiver<Vec<InboundEvent>> {
        self.signals.timeline.subscribe()
    }

    /// Sorted participants with typing flags, sampled.
    pub fn participants(&self) -> watch::Receiver<Vec<Participant>> {
        self.signals.participants.subscribe()
    }

    /// Upload percent, `None` when no upload is running.
    pub fn upload_progress(&self) -> watch::Receiver<Option<u8>> {
        self.signals.upload_progress.subscribe()
    }

    /// The settled local nick.
    pub fn identity(&self) -> watch::Receiver<Option<String>> {
        self.signals.identity.subscribe()
    }

    /// Backfill state, for a loading indicator.
    pub fn backfill(&self) -> watch::Receiver<BackfillState> {
        self.signals.backfill.subscribe()
    }

    /// Recoverable failures to show the user.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.signals.notices.subscribe()
    }

    /// Raw roster, updated on every change.
    pub fn clients_list(&self) -> watch::Receiver<Vec<ClientEntry>> {
        self.signals.clients.clone()
    }

    /// Raw typing map, updated on every change.
    pub fn typing_map(&self) -> watch::Receiver<TypingMap> {
        self.signals.typing.clone()
    }
}

impl std::fmt::Debug for ChatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHandle")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
