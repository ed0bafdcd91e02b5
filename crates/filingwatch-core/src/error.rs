//! Error types shared across the workspace.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilingWatchError>;

#[derive(Debug, Error)]
pub enum FilingWatchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("subprocess error: {0}")]
    Subprocess(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a delivery provider rejected or failed a send.
///
/// Used for diagnostics only: every kind is handled the same way by the
/// dispatcher (count as failed, never retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Authentication,
    Network,
    InvalidSender,
    RateLimited,
    Unknown,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Authentication => write!(f, "authentication"),
            TransportErrorKind::Network => write!(f, "network"),
            TransportErrorKind::InvalidSender => write!(f, "invalid_sender"),
            TransportErrorKind::RateLimited => write!(f, "rate_limited"),
            TransportErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("transport {kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Authentication, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn invalid_sender(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidSender, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::RateLimited, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unknown, message)
    }

    /// Operator-facing hint for the failure class.
    pub fn hint(&self) -> &'static str {
        match self.kind {
            TransportErrorKind::Authentication => {
                "check the transport credentials (SMTP relays usually need an app password)"
            }
            TransportErrorKind::Network => "check connectivity to the delivery provider",
            TransportErrorKind::InvalidSender => "the sender address is not accepted by the provider",
            TransportErrorKind::RateLimited => "the provider is throttling; raise dispatch.message_delay_ms",
            TransportErrorKind::Unknown => "see the provider message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::authentication("535 bad credentials");
        assert_eq!(
            err.to_string(),
            "transport authentication error: 535 bad credentials"
        );
        let wrapped: FilingWatchError = err.into();
        assert!(matches!(wrapped, FilingWatchError::Transport(_)));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TransportErrorKind::InvalidSender).unwrap();
        assert_eq!(json, "\"invalid_sender\"");
    }
}
