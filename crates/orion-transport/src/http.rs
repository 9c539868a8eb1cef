//! reqwest-backed HTTP collaborators.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use orion_core::{Attachment, AttachmentId, CompoundWebVideo, InboundEvent, MessageId, TransportError};
use orion_settings::ServerSettings;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use crate::ports::{
    AttachmentTransport, HistoryFetcher, UploadEvent, UploadEventStream, UploadPart,
    UploadProgress, VideoSourceFetcher,
};
use crate::urls::UrlFactory;

/// Size of the body chunks handed to the HTTP client. Progress advances once
/// per chunk.
const UPLOAD_CHUNK: usize = 64 * 1024;

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

fn build_client(server: &ServerSettings) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(server.request_timeout())
        .user_agent(concat!("orion-chat/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            warn!(error = %e, "http client configuration rejected");
            TransportError::ClientConfig(e.to_string())
        })
}

/// Map non-success statuses to [`TransportError::Http`].
fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TransportError::from_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
        ))
    }
}

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    what: &str,
) -> Result<T, TransportError> {
    let response = client.get(url).send().await.map_err(network)?;
    let response = check_status(response)?;
    let body = response.bytes().await.map_err(network)?;
    serde_json::from_slice(&body).map_err(|e| TransportError::decode(what, e))
}

/// Split `data` into chunks and report each chunk's length as it is pulled
/// into the request body.
fn counted_body(data: Bytes, progress: mpsc::UnboundedSender<u64>) -> reqwest::Body {
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK).min(data.len())))
        .collect();
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        let _ = progress.send(chunk.len() as u64);
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

enum Step {
    Sent(u64),
    Done(Result<Response, reqwest::Error>),
}

/// Multipart upload and download against the attachment endpoints.
#[derive(Clone, Debug)]
pub struct HttpAttachmentTransport {
    client: reqwest::Client,
    urls: UrlFactory,
}

impl HttpAttachmentTransport {
    /// Transport with its own client, configured from `server`.
    pub fn new(server: &ServerSettings) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(server)?,
            urls: UrlFactory::new(server),
        })
    }
}

#[async_trait]
impl AttachmentTransport for HttpAttachmentTransport {
    fn upload(&self, parts: Vec<UploadPart>) -> UploadEventStream {
        Box::pin(upload_stream(self.client.clone(), self.urls.upload_url(), parts))
    }

    #[instrument(skip_all, fields(file_id = %attachment.file_id))]
    async fn download(&self, attachment: &Attachment) -> Result<Bytes, TransportError> {
        let url = self.urls.download_url(attachment);
        let response = self.client.get(&url).send().await.map_err(network)?;
        let response = check_status(response)?;
        response.bytes().await.map_err(network)
    }
}

/// Drive one multipart POST, interleaving byte counts with the pending response.
fn upload_stream(
    client: reqwest::Client,
    url: String,
    parts: Vec<UploadPart>,
) -> impl Stream<Item = Result<UploadEvent, TransportError>> + Send + 'static {
    async_stream::try_stream! {
        let total: u64 = parts.iter().map(|p| p.file.size).sum();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let mut form = Form::new();
        for part in parts {
            let UploadPart { attachment_id, file } = part;
            let body = counted_body(file.data, progress_tx.clone());
            let mut field = Part::stream_with_length(body, file.size)
                .file_name(attachment_id.to_string());
            if !file.mime_type.is_empty() {
                field = field.mime_str(&file.mime_type).map_err(network)?;
            }
            form = form.part("file", field);
        }
        drop(progress_tx);
        debug!(%url, total, "upload started");

        let send = client.post(&url).multipart(form).send();
        tokio::pin!(send);
        let mut loaded = 0_u64;
        yield UploadEvent::Progress(UploadProgress { loaded, total });

        let response = loop {
            let step = tokio::select! {
                Some(n) = progress_rx.recv() => Step::Sent(n),
                result = &mut send => Step::Done(result),
            };
            match step {
                Step::Sent(n) => {
                    loaded = (loaded + n).min(total);
                    yield UploadEvent::Progress(UploadProgress { loaded, total });
                }
                Step::Done(result) => break result.map_err(network)?,
            }
        };
        if loaded < total {
            yield UploadEvent::Progress(UploadProgress { loaded: total, total });
        }

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let ids = if status == StatusCode::OK {
            let body = response.bytes().await.map_err(network)?;
            serde_json::from_slice::<HashMap<AttachmentId, AttachmentId>>(&body)
                .map_err(|e| TransportError::decode("upload response", e))?
        } else {
            warn!(%url, status = status.as_u16(), "upload rejected");
            HashMap::new()
        };
        yield UploadEvent::Response {
            status: status.as_u16(),
            status_text,
            ids,
        };
    }
}

/// Fetches history pages preceding an anchor message.
#[derive(Clone, Debug)]
pub struct HttpHistoryFetcher {
    client: reqwest::Client,
    urls: UrlFactory,
}

impl HttpHistoryFetcher {
    /// Fetcher with its own client, configured from `server`.
    pub fn new(server: &ServerSettings) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(server)?,
            urls: UrlFactory::new(server),
        })
    }
}

#[async_trait]
impl HistoryFetcher for HttpHistoryFetcher {
    #[instrument(skip_all, fields(anchor = %anchor))]
    async fn fetch_before(&self, anchor: &MessageId) -> Result<Vec<InboundEvent>, TransportError> {
        get_json(&self.client, &self.urls.history_url(anchor), "history page").await
    }
}

/// Fetches the renditions a video attachment already has.
#[derive(Clone, Debug)]
pub struct HttpVideoSourceFetcher {
    client: reqwest::Client,
    urls: UrlFactory,
}

impl HttpVideoSourceFetcher {
    /// Fetcher with its own client, configured from `server`.
    pub fn new(server: &ServerSettings) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(server)?,
            urls: UrlFactory::new(server),
        })
    }
}

#[async_trait]
impl VideoSourceFetcher for HttpVideoSourceFetcher {
    async fn video_sources(&self, attachment: &Attachment) -> Result<CompoundWebVideo, TransportError> {
        get_json(
            &self.client,
            &self.urls.video_sources_url(attachment),
            "video sources",
        )
        .await
    }
}
