//! Reelstream Core - Session lifecycle and progressive streaming
//!
//! This crate turns magnet links into isolated, short-lived download
//! sessions and serves their files over HTTP while they download: port
//! leasing, proxy dialing, torrent metadata parsing, the engine adapter
//! traits, the session manager with its idle reaper, and the streaming
//! responder.

pub mod config;
pub mod engine;
pub mod network;
pub mod session;
pub mod settings;
pub mod streaming;
pub mod torrent;
pub mod tracing_setup;

pub use config::ReelstreamConfig;
pub use engine::{EngineError, EngineFactory, EngineOptions, TorrentEngine};
pub use network::{DialerError, HttpTransport, PortAllocator, TransportError};
pub use session::{Session, SessionError, SessionManager};
pub use settings::{Settings, SettingsStore};
pub use streaming::{StreamingError, StreamingResponder};
pub use torrent::{InfoHash, MagnetLink, TorrentError, TorrentMetainfo};

/// Failure classes shared by every subsystem and mapped to HTTP statuses at
/// the API edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    UpstreamTimeout,
    ResourceExhaustion,
    InternalFailure,
}

/// Core errors that can bubble up from any Reelstream subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ReelstreamError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Streaming error: {0}")]
    Streaming(#[from] StreamingError),

    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Proxy error: {0}")]
    Dialer(#[from] DialerError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReelstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReelstreamError::Session(e) => e.kind(),
            ReelstreamError::Streaming(e) => e.kind(),
            ReelstreamError::Torrent(_) => ErrorKind::InvalidInput,
            ReelstreamError::Transport(TransportError::InvalidProxy(_)) => ErrorKind::InvalidInput,
            ReelstreamError::Dialer(DialerError::InvalidProxyConfig { .. }) => {
                ErrorKind::InvalidInput
            }
            ReelstreamError::Configuration { .. } => ErrorKind::InvalidInput,
            ReelstreamError::Transport(_) | ReelstreamError::Dialer(_) | ReelstreamError::Io(_) => {
                ErrorKind::InternalFailure
            }
        }
    }

    /// Returns a user-friendly error message suitable for display.
    ///
    /// Internal failures are not described in detail; they are logged where
    /// they happen.
    pub fn user_message(&self) -> String {
        match self {
            ReelstreamError::Session(e @ SessionError::Engine(_))
            | ReelstreamError::Session(e @ SessionError::Storage(_)) => {
                tracing::debug!(error = %e, "Hiding internal session error");
                "Failed to start torrent session".to_string()
            }
            ReelstreamError::Session(e) => e.to_string(),
            ReelstreamError::Streaming(StreamingError::Engine(_)) => {
                "Failed to read file".to_string()
            }
            ReelstreamError::Streaming(e) => e.to_string(),
            ReelstreamError::Torrent(e) => e.to_string(),
            ReelstreamError::Transport(TransportError::InvalidProxy(e)) => e.to_string(),
            ReelstreamError::Transport(_) => "Outbound HTTP client error".to_string(),
            ReelstreamError::Dialer(e) => e.to_string(),
            ReelstreamError::Configuration { reason } => format!("Configuration error: {reason}"),
            ReelstreamError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }
}

pub type Result<T> = std::result::Result<T, ReelstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let not_found: ReelstreamError = SessionError::NotFound { id: "ab".into() }.into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let timeout: ReelstreamError = SessionError::MetadataTimeout.into();
        assert_eq!(timeout.kind(), ErrorKind::UpstreamTimeout);
        assert!(timeout.user_message().contains("proxy might be blocking"));

        let too_large: ReelstreamError =
            StreamingError::SubtitleTooLarge { size: 2, limit: 1 }.into();
        assert_eq!(too_large.kind(), ErrorKind::ResourceExhaustion);

        let bad_torrent: ReelstreamError = TorrentError::InvalidTorrentFile {
            reason: "truncated".into(),
        }
        .into();
        assert!(bad_torrent.is_user_error());
    }

    #[test]
    fn test_internal_errors_are_not_detailed() {
        let engine: ReelstreamError = SessionError::Engine(EngineError::Launch {
            reason: "secret path /tmp/x".into(),
        })
        .into();
        assert_eq!(engine.kind(), ErrorKind::InternalFailure);
        assert!(!engine.user_message().contains("/tmp/x"));
        assert!(!engine.is_user_error());
    }
}
