//! File streaming endpoint.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub format: Option<String>,
}

/// Parses `3` or `3.vtt`. The suffix only selects the conversion when no
/// `format` query parameter is given.
pub fn parse_file_index(raw: &str) -> Result<(usize, bool), ApiError> {
    let (digits, vtt_suffix) = match raw.strip_suffix(".vtt") {
        Some(digits) => (digits, true),
        None => (raw, false),
    };
    let index = digits
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid file index: {raw}")))?;
    Ok((index, vtt_suffix))
}

/// `GET /session/{id}/stream/{file}`: streams a file, honoring `Range`.
pub async fn stream_file(
    State(state): State<AppState>,
    Path((id, file)): Path<(String, String)>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (index, vtt_suffix) = parse_file_index(&file)?;
    let session = state.manager.get_session(&id)?;

    let format = match query.format.as_deref() {
        Some(format) => Some(format),
        None if vtt_suffix => Some("vtt"),
        None => None,
    };

    tracing::debug!(session_id = %id, index, ?format, "Streaming file");
    Ok(state
        .responder
        .serve(session, index, &headers, format)
        .await?)
}
