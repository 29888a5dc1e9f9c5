//! Prowlarr search API.

use async_trait::async_trait;
use reelstream_core::settings::IndexerEndpoint;
use serde::Deserialize;

use super::{IndexerClient, fetch_body};
use crate::errors::MediaSearchError;
use crate::types::{IndexerKind, RawRelease, SearchResult};

const SEARCH_LIMIT: &str = "10";
const API_KEY_HEADER: &str = "X-Api-Key";

/// Searches a Prowlarr instance.
#[derive(Debug, Clone)]
pub struct ProwlarrClient {
    client: reqwest::Client,
    endpoint: IndexerEndpoint,
}

/// Release as returned by `/api/v1/search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProwlarrRelease {
    title: Option<String>,
    download_url: Option<String>,
    magnet_url: Option<String>,
    size: Option<f64>,
    seeders: Option<f64>,
    leechers: Option<f64>,
    indexer: Option<String>,
    publish_date: Option<String>,
    /// Only kept when the indexer reports it as a plain string
    category: Option<serde_json::Value>,
}

impl From<ProwlarrRelease> for RawRelease {
    fn from(release: ProwlarrRelease) -> Self {
        RawRelease {
            title: release.title,
            magnet_url: release.magnet_url,
            download_url: release.download_url,
            size: release.size,
            seeders: release.seeders,
            leechers: release.leechers,
            indexer: release.indexer,
            publish_date: release.publish_date,
            category: release
                .category
                .and_then(|category| category.as_str().map(str::to_string)),
        }
    }
}

impl ProwlarrClient {
    pub fn new(client: reqwest::Client, endpoint: IndexerEndpoint) -> Self {
        Self { client, endpoint }
    }

    /// Parses a search response body.
    ///
    /// # Errors
    /// - `MediaSearchError::ParseError` - Body is not a JSON array of releases
    pub fn parse_results(body: &str) -> Result<Vec<SearchResult>, MediaSearchError> {
        let releases: Vec<ProwlarrRelease> =
            serde_json::from_str(body).map_err(|e| MediaSearchError::ParseError {
                indexer: IndexerKind::Prowlarr,
                reason: e.to_string(),
            })?;
        Ok(releases
            .into_iter()
            .filter_map(|release| RawRelease::from(release).into_result())
            .collect())
    }
}

#[async_trait]
impl IndexerClient for ProwlarrClient {
    fn kind(&self) -> IndexerKind {
        IndexerKind::Prowlarr
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MediaSearchError> {
        let request = self
            .client
            .get(format!("{}/api/v1/search", self.endpoint.host))
            .query(&[("query", query), ("limit", SEARCH_LIMIT)])
            .header(API_KEY_HEADER, &self.endpoint.api_key);

        let body = fetch_body(self.kind(), request).await?;
        let results = Self::parse_results(&body)?;
        tracing::debug!(query, results = results.len(), "Prowlarr search finished");
        Ok(results)
    }

    async fn test_connection(&self) -> Result<String, MediaSearchError> {
        let request = self
            .client
            .get(format!("{}/api/v1/system/status", self.endpoint.host))
            .header(API_KEY_HEADER, &self.endpoint.api_key);
        fetch_body(self.kind(), request).await
    }
}
