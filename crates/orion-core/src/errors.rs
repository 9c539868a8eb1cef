//! Errors shared by every transport.

/// Failures raised by the connection channel and the HTTP collaborators.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The channel was closed (locally or by the peer); no further sends.
    #[error("connection closed")]
    ConnectionClosed,
    /// The outbound queue is full; the frame was not enqueued.
    #[error("outbound queue full")]
    QueueFull,
    /// WebSocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(String),
    /// The server answered with a non-success status.
    #[error("http error {status}: {status_text}")]
    Http {
        /// Status code.
        status: u16,
        /// Reason phrase.
        status_text: String,
    },
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// A payload did not have the expected shape.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// What was being decoded.
        what: String,
        /// Decoder message.
        reason: String,
    },
    /// A configured URL could not be used.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The HTTP client rejected its configuration.
    #[error("http client configuration rejected: {0}")]
    ClientConfig(String),
}

impl TransportError {
    /// Build an [`TransportError::Http`] from a status code, filling in the
    /// canonical reason phrase when the server sent none.
    pub fn from_status(status: u16, status_text: impl Into<String>) -> Self {
        let mut status_text = status_text.into();
        if status_text.is_empty() {
            status_text = canonical_reason(status).to_string();
        }
        Self::Http {
            status,
            status_text,
        }
    }

    /// Build a [`TransportError::Decode`] for `what`.
    pub fn decode(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status carried by the error, `0` when the request never got a response.
    pub fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            _ => 0,
        }
    }

    /// Human-readable status text for notices.
    pub fn status_text(&self) -> String {
        match self {
            Self::Http { status_text, .. } => status_text.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the connection is gone.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ConnectionClosed => "connection_closed",
            Self::QueueFull => "queue_full",
            Self::WebSocket(_) => "websocket",
            Self::Http { .. } => "http",
            Self::Network(_) => "network",
            Self::Decode { .. } => "decode",
            Self::InvalidUrl(_) => "invalid_url",
            Self::ClientConfig(_) => "client_config",
        }
    }
}

fn canonical_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn from_status_keeps_server_text() {
        let err = TransportError::from_status(404, "Gone Fishing");
        assert_matches!(err, TransportError::Http { status: 404, ref status_text } if status_text == "Gone Fishing");
    }

    #[test]
    fn from_status_fills_reason() {
        let err = TransportError::from_status(500, "");
        assert_eq!(err.status_text(), "Internal Server Error");
        assert_eq!(err.to_string(), "http error 500: Internal Server Error");
    }

    #[test]
    fn status_is_zero_without_response() {
        let err = TransportError::Network("connection refused".into());
        assert_eq!(err.status(), 0);
        assert_eq!(err.status_text(), "network error: connection refused");
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(TransportError::ConnectionClosed.error_kind(), "connection_closed");
        assert_eq!(TransportError::decode("payload", "eof").error_kind(), "decode");
        assert!(TransportError::ConnectionClosed.is_closed());
        assert_eq!(TransportError::ClientConfig("tls".into()).error_kind(), "client_config");
    }
}
