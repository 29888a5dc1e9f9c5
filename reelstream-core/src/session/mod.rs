//! Session lifecycle: one isolated torrent download per magnet link.
//!
//! A session owns exactly one engine, one leased listening port and one
//! scratch directory. The [`SessionManager`] maps info-hash ids to sessions,
//! creates them (unwinding fully on any failure), and destroys them on
//! explicit delete, idle sweep or shutdown.

mod manager;
mod resolver;
mod state;

pub use manager::{SessionManager, SessionSummary};
pub use resolver::LinkResolver;
pub use state::{ReaderGuard, Session};

use crate::ErrorKind;
use crate::engine::EngineError;

/// Errors from creating and looking up sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Could not resolve link to a magnet: {reason}")]
    UnresolvableLink { reason: String },

    #[error("Session {id} not found")]
    NotFound { id: String },

    #[error("Timeout getting info - proxy might be blocking BitTorrent traffic")]
    MetadataTimeout,

    #[error("Invalid proxy configuration: {reason}")]
    InvalidProxyConfig { reason: String },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Failed to prepare session storage: {0}")]
    Storage(#[from] std::io::Error),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidInput { .. } | SessionError::UnresolvableLink { .. } => {
                ErrorKind::InvalidInput
            }
            SessionError::NotFound { .. } => ErrorKind::NotFound,
            SessionError::MetadataTimeout => ErrorKind::UpstreamTimeout,
            SessionError::InvalidProxyConfig { .. }
            | SessionError::Engine(_)
            | SessionError::Storage(_) => ErrorKind::InternalFailure,
        }
    }
}
