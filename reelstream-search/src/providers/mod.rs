//! Indexer backends.

use async_trait::async_trait;

use crate::errors::MediaSearchError;
use crate::types::{IndexerKind, SearchResult};

pub mod jackett;
pub mod prowlarr;

pub use jackett::JackettClient;
pub use prowlarr::ProwlarrClient;

/// Longest upstream error body echoed back to clients.
const MAX_ERROR_BODY: usize = 512;

/// A configured indexer that can be searched.
#[async_trait]
pub trait IndexerClient: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> IndexerKind;

    /// Searches the indexer and returns releases that carry a usable link.
    ///
    /// # Errors
    /// - `MediaSearchError::NetworkError` - Indexer unreachable
    /// - `MediaSearchError::UpstreamStatus` - Indexer answered with an error status
    /// - `MediaSearchError::ParseError` - Response was not the expected JSON
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MediaSearchError>;

    /// Checks host and API key; returns the indexer's response body.
    ///
    /// # Errors
    /// - `MediaSearchError::NetworkError` - Indexer unreachable
    /// - `MediaSearchError::UpstreamStatus` - Key rejected or endpoint missing
    async fn test_connection(&self) -> Result<String, MediaSearchError>;
}

/// Sends a request and returns the body of a successful response.
pub(crate) async fn fetch_body(
    indexer: IndexerKind,
    request: reqwest::RequestBuilder,
) -> Result<String, MediaSearchError> {
    let response = request
        .send()
        .await
        .map_err(|e| MediaSearchError::NetworkError {
            indexer,
            reason: e.to_string(),
        })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| MediaSearchError::NetworkError {
            indexer,
            reason: format!("failed to read response: {e}"),
        })?;

    if !status.is_success() {
        tracing::warn!(%indexer, status = status.as_u16(), "Indexer returned error status");
        return Err(MediaSearchError::UpstreamStatus {
            indexer,
            status: status.as_u16(),
            body: truncate(body, MAX_ERROR_BODY),
        });
    }
    Ok(body)
}

fn truncate(mut body: String, limit: usize) -> String {
    if body.len() > limit {
        let mut end = limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
