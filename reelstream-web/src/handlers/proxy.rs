//! Proxy connectivity check.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use reelstream_core::{ReelstreamError, TransportError};
use serde::Deserialize;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyTestRequest {
    pub proxy_url: String,
}

/// `POST /proxy/test`: fetches the check endpoint through the given proxy.
///
/// Uses a one-off client so the shared transport is never touched.
pub async fn test_proxy(
    State(state): State<AppState>,
    payload: Result<Json<ProxyTestRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let proxy_url = request.proxy_url.trim();
    if proxy_url.is_empty() {
        return Err(ApiError::bad_request("Proxy URL not set"));
    }

    let client = state
        .transport
        .proxy_check_client(proxy_url)
        .map_err(|e| match e {
            TransportError::InvalidProxy(e) => {
                ApiError::bad_request(format!("Invalid proxy URL: {e}"))
            }
            other => ReelstreamError::from(other).into(),
        })?;

    let check_url = &state.transport.config().proxy_check_url;
    let response = client
        .get(check_url)
        .send()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Proxy connection failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::bad_gateway(format!(
            "Proxy check returned status {status}"
        )));
    }
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Proxy connection failed: {e}")))?;

    tracing::info!("Proxy check succeeded");
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
