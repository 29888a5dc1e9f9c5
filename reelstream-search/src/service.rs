//! Indexer search wired to the live settings and shared HTTP transport.

use std::sync::Arc;

use reelstream_core::network::HttpTransport;
use reelstream_core::settings::{IndexerEndpoint, SettingsStore};

use crate::errors::MediaSearchError;
use crate::providers::{IndexerClient, JackettClient, ProwlarrClient};
use crate::types::{IndexerKind, SearchResult};

/// Searches whichever indexers are currently configured.
///
/// Clients are built per call so proxy and indexer changes apply to the
/// next request.
#[derive(Debug, Clone)]
pub struct MediaSearchService {
    transport: Arc<HttpTransport>,
    settings: Arc<SettingsStore>,
}

impl MediaSearchService {
    pub fn new(transport: Arc<HttpTransport>, settings: Arc<SettingsStore>) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Client for an explicit endpoint, e.g. one submitted for testing.
    pub fn client_for(
        &self,
        kind: IndexerKind,
        endpoint: IndexerEndpoint,
    ) -> Box<dyn IndexerClient> {
        let client = self.transport.client();
        match kind {
            IndexerKind::Prowlarr => Box::new(ProwlarrClient::new(client, endpoint)),
            IndexerKind::Jackett => Box::new(JackettClient::new(client, endpoint)),
        }
    }

    /// Client for the indexer as configured in the current settings.
    ///
    /// # Errors
    /// - `MediaSearchError::NotConfigured` - Indexer disabled or incomplete
    pub fn configured_client(
        &self,
        kind: IndexerKind,
    ) -> Result<Box<dyn IndexerClient>, MediaSearchError> {
        let settings = self.settings.snapshot();
        let endpoint = match kind {
            IndexerKind::Prowlarr => settings.prowlarr_endpoint(),
            IndexerKind::Jackett => settings.jackett_endpoint(),
        }
        .ok_or(MediaSearchError::NotConfigured { indexer: kind })?;
        Ok(self.client_for(kind, endpoint))
    }

    /// Searches one indexer.
    ///
    /// # Errors
    /// - `MediaSearchError::EmptyQuery` - Blank query
    /// - `MediaSearchError::NotConfigured` - Indexer disabled or incomplete
    /// - `MediaSearchError::NetworkError`, `UpstreamStatus`, `ParseError` - Indexer failure
    pub async fn search(
        &self,
        kind: IndexerKind,
        query: &str,
    ) -> Result<Vec<SearchResult>, MediaSearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MediaSearchError::EmptyQuery);
        }
        let client = self.configured_client(kind)?;
        tracing::info!(indexer = %kind, query, "Searching indexer");
        client.search(query).await
    }

    /// Checks an endpoint before it is saved.
    ///
    /// # Errors
    /// - `MediaSearchError::NotConfigured` - Blank host or key
    /// - `MediaSearchError::NetworkError`, `UpstreamStatus` - Indexer failure
    pub async fn test_connection(
        &self,
        kind: IndexerKind,
        host: &str,
        api_key: &str,
    ) -> Result<String, MediaSearchError> {
        let endpoint = IndexerEndpoint::new(host, api_key)
            .ok_or(MediaSearchError::NotConfigured { indexer: kind })?;
        self.client_for(kind, endpoint).test_connection().await
    }
}
