//! Jackett search API.

use async_trait::async_trait;
use reelstream_core::settings::IndexerEndpoint;
use serde::Deserialize;

use super::{IndexerClient, fetch_body};
use crate::errors::MediaSearchError;
use crate::types::{IndexerKind, RawRelease, SearchResult};

/// Searches all indexers of a Jackett instance.
#[derive(Debug, Clone)]
pub struct JackettClient {
    client: reqwest::Client,
    endpoint: IndexerEndpoint,
}

#[derive(Debug, Deserialize)]
struct JackettResponse {
    #[serde(rename = "Results", default)]
    results: Vec<JackettRelease>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JackettRelease {
    title: Option<String>,
    link: Option<String>,
    magnet_uri: Option<String>,
    size: Option<f64>,
    seeders: Option<f64>,
    peers: Option<f64>,
    tracker: Option<String>,
    publish_date: Option<String>,
    #[serde(rename = "category")]
    category: Option<serde_json::Value>,
}

impl From<JackettRelease> for RawRelease {
    fn from(release: JackettRelease) -> Self {
        RawRelease {
            title: release.title,
            magnet_url: release.magnet_uri,
            download_url: release.link,
            size: release.size,
            seeders: release.seeders,
            leechers: release.peers,
            indexer: release.tracker,
            publish_date: release.publish_date,
            category: release
                .category
                .and_then(|category| category.as_str().map(str::to_string)),
        }
    }
}

impl JackettClient {
    pub fn new(client: reqwest::Client, endpoint: IndexerEndpoint) -> Self {
        Self { client, endpoint }
    }

    fn results_url(&self) -> String {
        format!("{}/api/v2.0/indexers/all/results", self.endpoint.host)
    }

    /// Parses a search response body.
    ///
    /// # Errors
    /// - `MediaSearchError::ParseError` - Body is not a Jackett results object
    pub fn parse_results(body: &str) -> Result<Vec<SearchResult>, MediaSearchError> {
        let response: JackettResponse =
            serde_json::from_str(body).map_err(|e| MediaSearchError::ParseError {
                indexer: IndexerKind::Jackett,
                reason: e.to_string(),
            })?;
        Ok(response
            .results
            .into_iter()
            .filter_map(|release| RawRelease::from(release).into_result())
            .collect())
    }
}

#[async_trait]
impl IndexerClient for JackettClient {
    fn kind(&self) -> IndexerKind {
        IndexerKind::Jackett
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MediaSearchError> {
        let request = self
            .client
            .get(self.results_url())
            .query(&[("Query", query), ("apikey", self.endpoint.api_key.as_str())]);

        let body = fetch_body(self.kind(), request).await?;
        let results = Self::parse_results(&body)?;
        tracing::debug!(query, results = results.len(), "Jackett search finished");
        Ok(results)
    }

    async fn test_connection(&self) -> Result<String, MediaSearchError> {
        let request = self
            .client
            .get(self.results_url())
            .query(&[("apikey", self.endpoint.api_key.as_str())]);
        fetch_body(self.kind(), request).await
    }
}
