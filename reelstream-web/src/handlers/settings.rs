//! Settings endpoints.
//!
//! Settings are held in memory only. Proxy changes rebuild the outbound
//! transport before they are stored, so a rejected URL leaves both the
//! settings and the transport untouched.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use reelstream_core::{ReelstreamError, Settings};
use reelstream_core::settings::{JackettSettings, ProwlarrSettings, ProxySettings};
use serde::Serialize;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `GET /settings`
pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.snapshot().as_ref().clone())
}

/// `POST /settings/proxy`
pub async fn update_proxy(
    State(state): State<AppState>,
    payload: Result<Json<ProxySettings>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(proxy) = payload?;

    // Rejects invalid URLs with 400 before anything is stored
    state
        .transport
        .reconfigure(&proxy)
        .map_err(ReelstreamError::from)?;

    tracing::info!(
        enabled = proxy.enable_proxy,
        "Proxy settings updated, new sessions will use them"
    );
    state.settings.set_proxy(proxy);

    Ok(Json(MessageResponse {
        message: "Proxy settings updated",
    }))
}

/// `POST /settings/prowlarr`
pub async fn update_prowlarr(
    State(state): State<AppState>,
    payload: Result<Json<ProwlarrSettings>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(prowlarr) = payload?;
    tracing::info!(enabled = prowlarr.enable_prowlarr, "Prowlarr settings updated");
    state.settings.set_prowlarr(prowlarr);

    Ok(Json(MessageResponse {
        message: "Prowlarr settings updated",
    }))
}

/// `POST /settings/jackett`
pub async fn update_jackett(
    State(state): State<AppState>,
    payload: Result<Json<JackettSettings>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(jackett) = payload?;
    tracing::info!(enabled = jackett.enable_jackett, "Jackett settings updated");
    state.settings.set_jackett(jackett);

    Ok(Json(MessageResponse {
        message: "Jackett settings updated",
    }))
}
