use std::sync::Arc;

use axum::http::header;

use super::SessionError;
use crate::network::HttpTransport;
use crate::torrent::{MagnetLink, TorrentMetainfo};

/// Turns an indexer download link into a magnet link.
///
/// Makes exactly one request without following redirects. A redirect to a
/// `magnet:` URI is used as is; a successful response carrying a `.torrent`
/// body is converted. Anything else cannot be resolved.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    transport: Arc<HttpTransport>,
    max_torrent_body: usize,
}

impl LinkResolver {
    pub fn new(transport: Arc<HttpTransport>, max_torrent_body: usize) -> Self {
        Self {
            transport,
            max_torrent_body,
        }
    }

    /// Resolves `link` to a magnet.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnresolvableLink` - Request failed, redirect to a
    ///   non-magnet location, or a body that is not a torrent file
    /// - `SessionError::InvalidInput` - Redirected to a malformed magnet
    pub async fn resolve(&self, link: &str) -> Result<MagnetLink, SessionError> {
        let unresolvable = |reason: String| SessionError::UnresolvableLink { reason };

        let mut response = self
            .transport
            .resolver()
            .get(link)
            .send()
            .await
            .map_err(|e| unresolvable(format!("request failed: {e}")))?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .unwrap_or_default();

            if location
                .get(..7)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"))
            {
                tracing::debug!(%status, "Link redirected to magnet");
                return MagnetLink::parse(location).map_err(|e| SessionError::InvalidInput {
                    reason: e.to_string(),
                });
            }
            return Err(unresolvable(format!(
                "redirect ({status}) to non-magnet location '{location}'"
            )));
        }

        if !status.is_success() {
            return Err(unresolvable(format!("unexpected status {status}")));
        }

        if response
            .content_length()
            .is_some_and(|length| length > self.max_torrent_body as u64)
        {
            return Err(unresolvable("torrent file too large".to_string()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| unresolvable(format!("failed to read body: {e}")))?
        {
            if body.len() + chunk.len() > self.max_torrent_body {
                return Err(unresolvable("torrent file too large".to_string()));
            }
            body.extend_from_slice(&chunk);
        }

        let metainfo = TorrentMetainfo::parse(&body)
            .map_err(|e| unresolvable(format!("response is not a torrent file: {e}")))?;
        tracing::debug!(info_hash = %metainfo.info_hash, "Link served a torrent file");
        Ok(metainfo.to_magnet())
    }
}
