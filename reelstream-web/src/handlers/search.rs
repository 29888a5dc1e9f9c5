//! Indexer search endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use reelstream_search::{IndexerKind, SearchResult};
use serde::Deserialize;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Host and key to check, in either the generic or the settings shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexerTestRequest {
    #[serde(alias = "prowlarrHost", alias = "jackettHost")]
    pub host: String,
    #[serde(alias = "prowlarrApiKey", alias = "jackettApiKey")]
    pub api_key: String,
}

fn indexer_kind(raw: &str) -> Result<IndexerKind, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, e))
}

/// `GET /search/{indexer}?q=`
pub async fn search_indexer(
    State(state): State<AppState>,
    Path(indexer): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    let kind = indexer_kind(&indexer)?;
    let results = state.search.search(kind, &query.q).await?;
    Ok(Json(results))
}

/// `POST /indexers/{indexer}/test`: returns the indexer's own status body.
pub async fn test_indexer(
    State(state): State<AppState>,
    Path(indexer): Path<String>,
    payload: Result<Json<IndexerTestRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let kind = indexer_kind(&indexer)?;
    let Json(request) = payload?;

    let body = state
        .search
        .test_connection(kind, &request.host, &request.api_key)
        .await?;
    tracing::info!(indexer = %kind, "Indexer connection test succeeded");

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
