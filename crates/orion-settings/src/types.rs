//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so partial JSON
//! files deserialize with defaults filled in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the chat client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Where the server lives.
    pub server: ServerSettings,
    /// Cadence of the orchestrator's timing operators.
    pub timing: TimingSettings,
    /// Queue capacities.
    pub channel: ChannelSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl ChatSettings {
    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        for (name, ms) in [
            ("timelineBatchMs", t.timeline_batch_ms),
            ("rosterSampleMs", t.roster_sample_ms),
            ("uploadProgressThrottleMs", t.upload_progress_throttle_ms),
        ] {
            if ms == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be > 0")));
            }
        }
        let c = &self.channel;
        if c.inbound_capacity == 0 || c.outbound_capacity == 0 || c.command_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "channel capacities must be > 0".into(),
            ));
        }
        if !self.server.ws_url.starts_with("ws://") && !self.server.ws_url.starts_with("wss://") {
            return Err(SettingsError::InvalidValue(format!(
                "wsUrl must use ws:// or wss://, got {}",
                self.server.ws_url
            )));
        }
        Ok(())
    }
}

/// Server endpoints. Paths are appended to `baseUrl`; the ones ending in `/`
/// get the resource id appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// WebSocket endpoint of the chat channel.
    pub ws_url: String,
    /// Base URL of the HTTP API.
    pub base_url: String,
    /// Multipart attachment upload.
    pub upload_path: String,
    /// Attachment download, followed by the file id.
    pub download_path: String,
    /// Message history, followed by the anchor message id.
    pub history_path: String,
    /// Thumbnails, followed by `{kind}/{fileId}`.
    pub thumbs_path: String,
    /// Video rendition listing, followed by the file id.
    pub video_sources_path: String,
    /// Prefix for video rendition `src` values.
    pub video_streams_path: String,
    /// Per-request timeout for HTTP calls.
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/ws".to_string(),
            base_url: "http://localhost:8080".to_string(),
            upload_path: "/api/attachments".to_string(),
            download_path: "/api/attachments/".to_string(),
            history_path: "/api/messages/history/".to_string(),
            thumbs_path: "/api/thumbs/".to_string(),
            video_sources_path: "/api/video/sources/".to_string(),
            video_streams_path: "/api/video/streams/".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl ServerSettings {
    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Timing windows, all in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingSettings {
    /// Timeline batching window.
    pub timeline_batch_ms: u64,
    /// Roster + typing sample period.
    pub roster_sample_ms: u64,
    /// Minimum spacing of upload progress updates.
    pub upload_progress_throttle_ms: u64,
    /// Quiet period before a scroll position is considered settled.
    pub history_debounce_ms: u64,
    /// Quiet period before a nick edit is propagated.
    pub nick_debounce_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            timeline_batch_ms: 600,
            roster_sample_ms: 700,
            upload_progress_throttle_ms: 1000,
            history_debounce_ms: 200,
            nick_debounce_ms: 1000,
        }
    }
}

impl TimingSettings {
    /// Timeline batch window.
    pub fn timeline_batch(&self) -> Duration {
        Duration::from_millis(self.timeline_batch_ms)
    }

    /// Roster sample period.
    pub fn roster_sample(&self) -> Duration {
        Duration::from_millis(self.roster_sample_ms)
    }

    /// Minimum gap between upload progress updates.
    pub fn upload_progress_throttle(&self) -> Duration {
        Duration::from_millis(self.upload_progress_throttle_ms)
    }

    /// Quiet period before a scroll position counts.
    pub fn history_debounce(&self) -> Duration {
        Duration::from_millis(self.history_debounce_ms)
    }

    /// Quiet period before a nick change is sent.
    pub fn nick_debounce(&self) -> Duration {
        Duration::from_millis(self.nick_debounce_ms)
    }
}

/// Bounded queue sizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Inbound queue depth per subscriber, ordered or broadcast.
    pub inbound_capacity: usize,
    /// Outbound frames waiting for the socket writer.
    pub outbound_capacity: usize,
    /// Commands waiting for the orchestrator loop.
    pub command_capacity: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            inbound_capacity: 1024,
            outbound_capacity: 256,
            command_capacity: 64,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let t = TimingSettings::default();
        assert_eq!(t.timeline_batch(), Duration::from_millis(600));
        assert_eq!(t.roster_sample(), Duration::from_millis(700));
        assert_eq!(t.upload_progress_throttle(), Duration::from_secs(1));
        assert_eq!(t.history_debounce(), Duration::from_millis(200));
        assert_eq!(t.nick_debounce(), Duration::from_secs(1));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ChatSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut s = ChatSettings::default();
        s.timing.roster_sample_ms = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("rosterSampleMs"));
    }

    #[test]
    fn http_ws_url_is_rejected() {
        let mut s = ChatSettings::default();
        s.server.ws_url = "http://localhost/ws".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: ChatSettings =
            serde_json::from_str(r#"{"timing": {"nickDebounceMs": 250}}"#).unwrap();
        assert_eq!(s.timing.nick_debounce_ms, 250);
        assert_eq!(s.timing.timeline_batch_ms, 600);
        assert_eq!(s.channel.inbound_capacity, 1024);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ChatSettings::default()).unwrap();
        assert_eq!(json["server"]["wsUrl"], "ws://localhost:8080/ws");
        assert_eq!(json["timing"]["historyDebounceMs"], 200);
    }
}
