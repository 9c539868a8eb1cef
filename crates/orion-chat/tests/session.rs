#![allow(missing_docs)]

//! End-to-end session behavior over a loopback channel with a paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use orion_chat::{
    BackfillState, ChatDeps, ChatError, ChatHandle, ChatOrchestrator, Notice, OutgoingComposite,
    ScrollGeometry, ViewportError, ViewportPort,
};
use orion_core::{
    Attachment, AttachmentId, CompoundWebVideo, EventType, IdFactory, InboundEvent, MessageId,
    OutboundKind, RichMessage, TransportError,
};
use orion_settings::{ChatSettings, ServerSettings};
use orion_transport::{
    AttachmentTransport, ConnectionChannel, HistoryFetcher, LocalFile, LoopbackPeer, UploadEvent,
    UploadEventStream, UploadPart, UploadProgress, UrlFactory, VideoSourceFetcher,
};
use tokio::task::JoinHandle;
use tokio::time::sleep;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// ── fakes ──

#[derive(Default)]
struct FakeHistory {
    calls: Mutex<Vec<MessageId>>,
    pages: Mutex<HashMap<MessageId, Vec<InboundEvent>>>,
    latency: Duration,
}

impl FakeHistory {
    fn calls(&self) -> Vec<MessageId> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryFetcher for FakeHistory {
    async fn fetch_before(&self, anchor: &MessageId) -> Result<Vec<InboundEvent>, TransportError> {
        self.calls.lock().unwrap().push(anchor.clone());
        sleep(self.latency).await;
        Ok(self.pages.lock().unwrap().remove(anchor).unwrap_or_default())
    }
}

#[derive(Default)]
struct FakeAttachments {
    response: Mutex<Option<(u16, Vec<(&'static str, &'static str)>)>>,
    uploaded: Mutex<Vec<AttachmentId>>,
    downloads: AtomicUsize,
}

#[async_trait]
impl AttachmentTransport for FakeAttachments {
    fn upload(&self, parts: Vec<UploadPart>) -> UploadEventStream {
        let total: u64 = parts.iter().map(|p| p.file.size).sum();
        self.uploaded
            .lock()
            .unwrap()
            .extend(parts.into_iter().map(|p| p.attachment_id));
        let (status, ids) = self.response.lock().unwrap().take().unwrap_or((500, Vec::new()));
        let events = vec![
            Ok(UploadEvent::Progress(UploadProgress { loaded: total / 2, total })),
            Ok(UploadEvent::Progress(UploadProgress { loaded: total, total })),
            Ok(UploadEvent::Response {
                status,
                status_text: String::new(),
                ids: ids
                    .into_iter()
                    .map(|(a, s)| (AttachmentId::from(a), AttachmentId::from(s)))
                    .collect(),
            }),
        ];
        Box::pin(futures::stream::iter(events))
    }

    async fn download(&self, attachment: &Attachment) -> Result<Bytes, TransportError> {
        let _ = self.downloads.fetch_add(1, Ordering::SeqCst);
        if attachment.file_id.as_str() == "missing" {
            Err(TransportError::from_status(404, ""))
        } else {
            Ok(Bytes::from_static(b"payload"))
        }
    }
}

struct NoVideos;

#[async_trait]
impl VideoSourceFetcher for NoVideos {
    async fn video_sources(&self, _attachment: &Attachment) -> Result<CompoundWebVideo, TransportError> {
        Ok(CompoundWebVideo::default())
    }
}

#[derive(Default)]
struct RecordingViewport {
    bottoms: AtomicUsize,
    anchors: Mutex<Vec<MessageId>>,
}

impl ViewportPort for RecordingViewport {
    fn is_mounted(&self) -> bool {
        true
    }

    fn current_scroll_offset(&self) -> Result<u32, ViewportError> {
        Ok(0)
    }

    fn scroll_to_bottom(&self) -> Result<(), ViewportError> {
        let _ = self.bottoms.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn scroll_to_anchor(&self, id: &MessageId) -> Result<(), ViewportError> {
        self.anchors.lock().unwrap().push(id.clone());
        Ok(())
    }
}

struct SeqIds(AtomicUsize);

impl IdFactory for SeqIds {
    fn new_attachment_id(&self) -> AttachmentId {
        AttachmentId::from(format!("a{}", self.0.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

struct Session {
    handle: ChatHandle,
    peer: LoopbackPeer,
    task: JoinHandle<()>,
    history: Arc<FakeHistory>,
    attachments: Arc<FakeAttachments>,
    viewport: Arc<RecordingViewport>,
}

fn start_with(history: FakeHistory) -> Session {
    let settings = ChatSettings::default();
    let (channel, peer) = ConnectionChannel::loopback(&settings.channel);
    let history = Arc::new(history);
    let attachments = Arc::new(FakeAttachments::default());
    let viewport = Arc::new(RecordingViewport::default());
    let deps = ChatDeps {
        channel,
        attachments: Arc::clone(&attachments) as Arc<dyn AttachmentTransport>,
        history: Arc::clone(&history) as Arc<dyn HistoryFetcher>,
        videos: Arc::new(NoVideos),
        viewport: Arc::clone(&viewport) as Arc<dyn ViewportPort>,
        ids: Arc::new(SeqIds(AtomicUsize::new(0))),
        urls: UrlFactory::new(&ServerSettings::default()),
    };
    let (handle, task) = ChatOrchestrator::spawn(deps, &settings);
    Session {
        handle,
        peer,
        task,
        history,
        attachments,
        viewport,
    }
}

fn start() -> Session {
    start_with(FakeHistory::default())
}

fn msg(id: &str) -> InboundEvent {
    InboundEvent::new(id, EventType::Msg, format!("text of {id}"))
}

fn marker() -> InboundEvent {
    InboundEvent::internal(EventType::Info, "connected")
}

fn timeline_ids(handle: &ChatHandle) -> Vec<String> {
    handle
        .timeline()
        .borrow()
        .iter()
        .map(|e| e.id.as_str().to_owned())
        .collect()
}

fn file(name: &str) -> LocalFile {
    LocalFile::new(name, "image/png", 1_700_000_000_000, vec![1_u8; 64])
}

// ── timeline ──

#[tokio::test(start_paused = true)]
async fn timeline_is_delivered_in_batches() {
    let s = start();
    assert!(s.peer.push(msg("m1")).await);
    assert!(s.peer.push(InboundEvent::new("t", EventType::TypingSet, "[]")).await);
    assert!(s.peer.push(msg("m2")).await);

    sleep(ms(300)).await;
    assert!(timeline_ids(&s.handle).is_empty());

    sleep(ms(350)).await;
    assert_eq!(timeline_ids(&s.handle), ["m1", "m2"]);
    assert_eq!(s.viewport.bottoms.load(Ordering::SeqCst), 1);

    assert!(s.peer.push(msg("m3")).await);
    sleep(ms(600)).await;
    assert_eq!(timeline_ids(&s.handle), ["m1", "m2", "m3"]);

    // empty windows trigger no render pass
    sleep(ms(3000)).await;
    assert_eq!(s.viewport.bottoms.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn burst_larger_than_inbound_capacity_is_not_dropped() {
    let s = start();
    for i in 0..1500 {
        assert!(s.peer.push(msg(&format!("m{i}"))).await);
    }

    sleep(ms(700)).await;
    let ids = timeline_ids(&s.handle);
    assert_eq!(ids.len(), 1500);
    assert_eq!(ids.first().map(String::as_str), Some("m0"));
    assert_eq!(ids.last().map(String::as_str), Some("m1499"));
}

#[tokio::test(start_paused = true)]
async fn clear_command_empties_timeline_and_open_window() {
    let s = start();
    assert!(s.peer.push(msg("m1")).await);
    sleep(ms(650)).await;
    assert_eq!(timeline_ids(&s.handle), ["m1"]);

    assert!(s.peer.push(msg("m2")).await);
    assert!(s.peer.push(InboundEvent::clear_chat()).await);
    sleep(ms(650)).await;
    assert!(timeline_ids(&s.handle).is_empty());

    // clearing an empty timeline is a no-op
    assert!(s.peer.push(InboundEvent::clear_chat()).await);
    assert!(s.peer.push(msg("m3")).await);
    sleep(ms(650)).await;
    assert_eq!(timeline_ids(&s.handle), ["m3"]);
}

#[tokio::test(start_paused = true)]
async fn pinned_view_is_not_scrolled() {
    let s = start();
    s.handle
        .on_scroll(ScrollGeometry {
            top: 10,
            height: 2000,
            client_height: 500,
        })
        .await
        .unwrap();
    assert!(s.peer.push(msg("m1")).await);
    sleep(ms(650)).await;
    assert_eq!(timeline_ids(&s.handle), ["m1"]);
    assert_eq!(s.viewport.bottoms.load(Ordering::SeqCst), 0);

    s.handle.set_fixed_scroll(false).await.unwrap();
    assert!(s.peer.push(msg("m2")).await);
    sleep(ms(650)).await;
    assert_eq!(s.viewport.bottoms.load(Ordering::SeqCst), 1);
}

// ── roster ──

#[tokio::test(start_paused = true)]
async fn roster_is_sampled_sorted_and_merged() {
    let s = start();
    assert!(s.peer.push(InboundEvent::new(
        "s1",
        EventType::ClientList,
        r#"[{"clientId":"b","nick":"bob"},{"clientId":"a","nick":"amy"}]"#,
    )).await);
    assert!(s.peer.push(InboundEvent::new("s2", EventType::TypingSet, r#"["a"]"#)).await);

    sleep(ms(10)).await;
    // reducers apply immediately, the merged view waits for the sample tick
    assert_eq!(s.handle.clients_list().borrow().len(), 2);
    assert!(s.handle.participants().borrow().is_empty());

    sleep(ms(700)).await;
    let merged: Vec<(String, bool)> = s
        .handle
        .participants()
        .borrow()
        .iter()
        .map(|p| (p.nick.clone(), p.is_typing))
        .collect();
    assert_eq!(merged, [("amy".to_owned(), true), ("bob".to_owned(), false)]);
}

#[tokio::test(start_paused = true)]
async fn roster_reflects_events_in_arrival_order() {
    let s = start();
    assert!(s.peer.push(InboundEvent::new(
        "s1",
        EventType::ClientList,
        r#"[{"clientId":"c1","nick":"zed"}]"#,
    )).await);
    assert!(s.peer.push(InboundEvent::new(
        "s2",
        EventType::NickUpdate,
        r#"{"clientId":"c1","nick":"abe"}"#,
    )).await);
    assert!(s.peer.push(InboundEvent::new(
        "s3",
        EventType::ClientList,
        r#"[{"clientId":"c1","nick":"abe"},{"clientId":"c2","nick":"Bea"}]"#,
    )).await);
    sleep(ms(800)).await;
    let nicks: Vec<String> = s
        .handle
        .participants()
        .borrow()
        .iter()
        .map(|p| p.nick.clone())
        .collect();
    assert_eq!(nicks, ["abe", "Bea"]);
}

// ── backfill ──

fn history_with(anchor: &str, page: Vec<InboundEvent>, latency: Duration) -> FakeHistory {
    let history = FakeHistory {
        latency,
        ..FakeHistory::default()
    };
    let _ = history
        .pages
        .lock()
        .unwrap()
        .insert(MessageId::from(anchor), page);
    history
}

#[tokio::test(start_paused = true)]
async fn backfill_fetches_once_and_splices_before_anchor() {
    let s = start_with(history_with("M3", vec![msg("P1"), msg("P2")], ms(500)));
    for e in [marker(), marker(), msg("M3"), msg("M4")] {
        assert!(s.peer.push(e).await);
    }
    sleep(ms(650)).await;
    assert_eq!(timeline_ids(&s.handle), ["internal", "internal", "M3", "M4"]);

    // two qualifying triggers before the fetch resolves
    s.handle.on_scroll_offset(0).await.unwrap();
    sleep(ms(250)).await;
    assert_matches!(&*s.handle.backfill().borrow(), BackfillState::FetchInFlight { anchor } if anchor.as_str() == "M3");
    s.handle.on_scroll_offset(0).await.unwrap();
    sleep(ms(250)).await;

    sleep(ms(1000)).await;
    assert_eq!(s.history.calls(), [MessageId::from("M3")]);
    assert_eq!(timeline_ids(&s.handle), ["P1", "P2", "M3", "M4"]);
    assert_eq!(*s.viewport.anchors.lock().unwrap(), [MessageId::from("M3")]);
    assert_eq!(*s.handle.backfill().borrow(), BackfillState::Idle);

    // the next trigger after completion is honored; an empty page changes nothing
    s.handle.on_scroll_offset(0).await.unwrap();
    sleep(ms(1000)).await;
    assert_eq!(
        s.history.calls(),
        [MessageId::from("M3"), MessageId::from("P1")]
    );
    assert_eq!(timeline_ids(&s.handle), ["P1", "P2", "M3", "M4"]);
}

#[tokio::test(start_paused = true)]
async fn scroll_noise_is_debounced() {
    let s = start_with(history_with("M1", vec![msg("P0")], ms(10)));
    assert!(s.peer.push(msg("M1")).await);
    sleep(ms(650)).await;

    // passes through the top but settles elsewhere
    for top in [40, 0, 25] {
        s.handle.on_scroll_offset(top).await.unwrap();
        sleep(ms(50)).await;
    }
    sleep(ms(500)).await;
    assert!(s.history.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn backfill_needs_a_server_message() {
    let s = start();
    assert!(s.peer.push(marker()).await);
    sleep(ms(650)).await;
    s.handle.on_scroll_offset(0).await.unwrap();
    sleep(ms(500)).await;
    assert!(s.history.calls().is_empty());
    assert_eq!(*s.handle.backfill().borrow(), BackfillState::Idle);
}

// ── dispatch ──

#[tokio::test(start_paused = true)]
async fn plain_message_is_sent_immediately() {
    let mut s = start();
    s.handle
        .send_message(OutgoingComposite::text("hello"))
        .await
        .unwrap();
    let frame = s.peer.try_outbound().unwrap();
    assert_eq!(frame.kind, OutboundKind::Msg);
    assert_eq!(frame.payload, "hello");
    assert!(s.attachments.uploaded.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn uploaded_attachments_carry_server_ids() {
    let mut s = start();
    *s.attachments.response.lock().unwrap() = Some((200, vec![("a1", "s1"), ("a2", "s2")]));

    s.handle
        .send_message(OutgoingComposite::with_files(
            "look",
            vec![file("x.png"), file("y.png")],
        ))
        .await
        .unwrap();

    assert_eq!(
        *s.attachments.uploaded.lock().unwrap(),
        [AttachmentId::from("a1"), AttachmentId::from("a2")]
    );
    let frame = s.peer.try_outbound().unwrap();
    assert_eq!(frame.kind, OutboundKind::RichMsg);
    let rich: RichMessage = serde_json::from_str(&frame.payload).unwrap();
    assert_eq!(rich.message, "look");
    let ids: Vec<&str> = rich.attachments.iter().map(|a| a.file_id.as_str()).collect();
    assert_eq!(ids, ["s1", "s2"]);
    assert_eq!(rich.attachments[0].name, "x.png");
    assert_eq!(*s.handle.upload_progress().borrow(), None);
}

#[tokio::test(start_paused = true)]
async fn failed_upload_sends_nothing() {
    let mut s = start();
    *s.attachments.response.lock().unwrap() = Some((500, Vec::new()));

    let err = s
        .handle
        .send_message(OutgoingComposite::with_files("x", vec![file("x.png")]))
        .await
        .unwrap_err();
    assert_matches!(err, ChatError::Upload(e) if e.status() == 500);
    assert!(s.peer.try_outbound().is_none());
    assert_eq!(*s.handle.upload_progress().borrow(), None);
}

#[tokio::test(start_paused = true)]
async fn partial_id_mapping_aborts_send() {
    let mut s = start();
    *s.attachments.response.lock().unwrap() = Some((200, vec![("a1", "s1")]));

    let err = s
        .handle
        .send_message(OutgoingComposite::with_files(
            "x",
            vec![file("x.png"), file("y.png")],
        ))
        .await
        .unwrap_err();
    assert_matches!(err, ChatError::UploadIncomplete { missing } if missing == [AttachmentId::from("a2")]);
    assert!(s.peer.try_outbound().is_none());
}

// ── download ──

#[tokio::test(start_paused = true)]
async fn download_failure_becomes_a_notice() {
    let s = start();
    let mut notices = s.handle.notices();
    let missing = Attachment {
        file_id: "missing".into(),
        name: "report.pdf".into(),
        size: 1,
        last_modified: 0,
        mime_type: "application/pdf".into(),
    };
    assert!(s.handle.download_attachment(&missing).await.is_none());
    let notice = notices.recv().await.unwrap();
    assert_eq!(
        notice,
        Notice::DownloadFailed {
            status: 404,
            status_text: "Not Found".into(),
            name: "report.pdf".into(),
        }
    );

    // later downloads are unaffected
    let present = Attachment {
        file_id: "s1".into(),
        ..missing
    };
    assert_eq!(
        s.handle.download_attachment(&present).await,
        Some(Bytes::from_static(b"payload"))
    );
    assert_eq!(s.attachments.downloads.load(Ordering::SeqCst), 2);
}

// ── nick ──

#[tokio::test(start_paused = true)]
async fn nick_changes_are_debounced_and_deduplicated() {
    let mut s = start();
    for nick in ["a", "al", "ali"] {
        s.handle.nick_input(nick).await.unwrap();
        sleep(ms(300)).await;
    }
    sleep(ms(600)).await;
    assert!(s.peer.try_outbound().is_none());

    sleep(ms(200)).await;
    let frames = s.peer.drain_outbound();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].kind, OutboundKind::UpdateMe);
    assert_eq!(frames[0].payload, r#"{"nick":"ali"}"#);
    assert_eq!(s.handle.identity().borrow().as_deref(), Some("ali"));

    // same value again: nothing
    s.handle.nick_input("ali").await.unwrap();
    sleep(ms(1100)).await;
    assert!(s.peer.try_outbound().is_none());

    // empty value: nothing, identity unchanged
    s.handle.nick_input("").await.unwrap();
    sleep(ms(1100)).await;
    assert!(s.peer.try_outbound().is_none());
    assert_eq!(s.handle.identity().borrow().as_deref(), Some("ali"));
}

// ── lifecycle ──

#[tokio::test(start_paused = true)]
async fn close_flushes_and_stops_everything() {
    let s = start();
    assert!(s.peer.push(msg("m1")).await);
    sleep(ms(10)).await;
    s.handle.close();

    s.task.await.unwrap();
    assert_eq!(timeline_ids(&s.handle), ["m1"]);
    assert_matches!(
        s.handle.user_typing(),
        Err(ChatError::Transport(TransportError::ConnectionClosed))
    );
    assert_matches!(s.handle.nick_input("late").await, Err(ChatError::Stopped));
    assert!(!s.peer.push(msg("m2")).await);
}

#[tokio::test(start_paused = true)]
async fn transport_drop_ends_the_session() {
    let s = start();
    s.peer.drop_transport();
    s.task.await.unwrap();
    assert_matches!(
        s.handle.send_message(OutgoingComposite::text("hi")).await,
        Err(ChatError::Transport(TransportError::ConnectionClosed))
    );
}

#[tokio::test(start_paused = true)]
async fn typing_pulse_is_sent() {
    let mut s = start();
    s.handle.user_typing().unwrap();
    assert_eq!(s.peer.try_outbound().unwrap().kind, OutboundKind::SetTyping);
}
