//! `.torrent` upload conversion.

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use reelstream_core::{TorrentError, TorrentMetainfo};
use serde::Serialize;

use crate::error::ApiError;
use crate::server::AppState;

const TORRENT_FIELD: &str = "torrent";

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub magnet: String,
}

/// `POST /torrent/convert`: turns an uploaded `.torrent` into a magnet link.
pub async fn convert_torrent(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let limit = state.config.session.max_torrent_body;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(TORRENT_FIELD) {
            continue;
        }
        let bytes = field.bytes().await?;
        if bytes.len() > limit {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Torrent file exceeds {limit} bytes"),
            ));
        }

        let metainfo = TorrentMetainfo::parse(&bytes).map_err(|e| {
            let reason = match e {
                TorrentError::InvalidTorrentFile { reason } => reason,
                other => other.to_string(),
            };
            ApiError::bad_request(format!("Invalid torrent file: {reason}"))
        })?;

        tracing::info!(info_hash = %metainfo.info_hash, name = %metainfo.name, "Converted torrent file");
        return Ok(Json(ConvertResponse {
            magnet: metainfo.to_magnet().to_uri(),
        }));
    }

    Err(ApiError::bad_request("Missing 'torrent' file field"))
}
