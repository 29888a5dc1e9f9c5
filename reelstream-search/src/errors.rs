//! Error types for indexer search.

use thiserror::Error;

use crate::types::IndexerKind;

/// Errors that can occur while talking to an indexer.
#[derive(Debug, Error)]
pub enum MediaSearchError {
    /// Indexer disabled, or host or API key missing.
    #[error("{indexer} host or API key not set")]
    NotConfigured { indexer: IndexerKind },

    #[error("No search query provided")]
    EmptyQuery,

    /// The indexer could not be reached.
    #[error("Failed to connect to {indexer}: {reason}")]
    NetworkError { indexer: IndexerKind, reason: String },

    /// The indexer answered with a non-success status.
    #[error("{indexer} returned status {status}: {body}")]
    UpstreamStatus {
        indexer: IndexerKind,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {indexer} response: {reason}")]
    ParseError { indexer: IndexerKind, reason: String },
}

impl MediaSearchError {
    /// Errors caused by the request or the local configuration rather than
    /// the indexer.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MediaSearchError::NotConfigured { .. } | MediaSearchError::EmptyQuery
        )
    }
}
