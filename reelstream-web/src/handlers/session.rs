//! Session lifecycle endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use reelstream_core::engine::TorrentFile;
use reelstream_core::session::SessionSummary;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(alias = "magnet")]
    pub magnet_or_link: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// `POST /session`: starts a session and waits for its metadata.
pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let Json(request) = payload?;
    let session = state.manager.create_session(&request.magnet_or_link).await?;

    Ok(Json(CreateSessionResponse {
        session_id: session.id().to_string(),
    }))
}

/// `GET /session/{id}`: lists the files of a session.
pub async fn list_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TorrentFile>>, ApiError> {
    Ok(Json(state.manager.list_files(&id)?))
}

/// `DELETE /session/{id}`: destroys a session. Unknown ids succeed too.
pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if !state.manager.teardown(&id).await {
        tracing::debug!(session_id = %id, "Delete of unknown session");
    }
    StatusCode::NO_CONTENT
}

/// `GET /sessions`
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.manager.list_sessions())
}
