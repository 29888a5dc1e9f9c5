//! API error responses.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reelstream_core::{ErrorKind, ReelstreamError, SessionError, StreamingError};
use reelstream_search::MediaSearchError;
use serde_json::json;

/// Error returned by every handler, rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// HTTP status for a failure class.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::ResourceExhaustion => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ReelstreamError> for ApiError {
    fn from(error: ReelstreamError) -> Self {
        let kind = error.kind();
        if kind == ErrorKind::InternalFailure {
            tracing::error!(error = %error, "Request failed");
        } else {
            tracing::debug!(error = %error, "Request rejected");
        }
        Self::new(status_for(kind), error.user_message())
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        ReelstreamError::from(error).into()
    }
}

impl From<StreamingError> for ApiError {
    fn from(error: StreamingError) -> Self {
        ReelstreamError::from(error).into()
    }
}

impl From<MediaSearchError> for ApiError {
    fn from(error: MediaSearchError) -> Self {
        if error.is_user_error() {
            Self::bad_request(error.to_string())
        } else {
            tracing::warn!(error = %error, "Indexer request failed");
            Self::bad_gateway(error.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), format!("Invalid upload: {}", error.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use reelstream_core::engine::EngineError;

    use super::*;

    #[test]
    fn test_session_errors_map_to_statuses() {
        let cases = [
            (
                SessionError::InvalidInput { reason: "x".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::UnresolvableLink { reason: "x".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::NotFound { id: "x".into() },
                StatusCode::NOT_FOUND,
            ),
            (SessionError::MetadataTimeout, StatusCode::GATEWAY_TIMEOUT),
            (
                SessionError::Engine(EngineError::Closed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn test_streaming_errors_map_to_statuses() {
        let too_large = ApiError::from(StreamingError::SubtitleTooLarge { size: 2, limit: 1 });
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let bad_index = ApiError::from(StreamingError::IndexOutOfRange { index: 3, count: 1 });
        assert_eq!(bad_index.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_timeout_message_carries_proxy_hint() {
        let error = ApiError::from(SessionError::MetadataTimeout);
        assert_eq!(
            error.message(),
            "Timeout getting info - proxy might be blocking BitTorrent traffic"
        );
    }
}
