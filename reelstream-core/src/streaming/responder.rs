//! HTTP responses for session files.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Stream, stream};

use super::range::{RangeOutcome, parse_range};
use super::subtitles::srt_to_vtt;
use super::{StreamingError, content_type, extension, is_subtitle};
use crate::config::StreamingConfig;
use crate::engine::FileReader;
use crate::session::{ReaderGuard, Session};

/// Serves file content of a session over HTTP.
#[derive(Debug, Clone, Default)]
pub struct StreamingResponder {
    config: StreamingConfig,
}

impl StreamingResponder {
    pub fn new(config: StreamingConfig) -> Self {
        Self { config }
    }

    /// Builds the response for one file of `session`.
    ///
    /// An SRT file requested with `format=vtt` is read whole and converted.
    /// Anything else is streamed from the engine, honoring a single `Range`
    /// header; the body waits for bytes that are still downloading.
    ///
    /// # Errors
    ///
    /// - `StreamingError::IndexOutOfRange` - No file at `file_index`
    /// - `StreamingError::SubtitleTooLarge` - Subtitle over the conversion limit
    /// - `StreamingError::Engine` - The reader could not be opened or read
    pub async fn serve(
        &self,
        session: Arc<Session>,
        file_index: usize,
        headers: &HeaderMap,
        format: Option<&str>,
    ) -> Result<Response, StreamingError> {
        session.touch();

        let file = session
            .files()
            .get(file_index)
            .ok_or(StreamingError::IndexOutOfRange {
                index: file_index,
                count: session.files().len(),
            })?;
        let name = file.name.clone();

        if format == Some("vtt") && extension(&name).as_deref() == Some("srt") {
            return self.serve_vtt(&session, file_index).await;
        }

        let reader = session.open_reader(file_index).await?;
        let size = reader.size();
        let range_header = headers.get(header::RANGE).and_then(|value| value.to_str().ok());
        let outcome = parse_range(range_header, size);

        tracing::debug!(
            session_id = %session.id(),
            file_index,
            size,
            range = ?range_header,
            "Serving file"
        );

        let (status, range) = match outcome {
            RangeOutcome::Unsatisfiable => {
                return Ok(unsatisfiable(size));
            }
            RangeOutcome::Partial(range) => (StatusCode::PARTIAL_CONTENT, Some(range)),
            RangeOutcome::Full => (StatusCode::OK, None),
        };
        let (start, length) = range.map_or((0, size), |range| (range.start, range.len()));

        let body = Body::from_stream(chunk_stream(BodyState {
            reader,
            guard: ReaderGuard::new(Arc::clone(&session)),
            position: start,
            end: start + length,
            chunk_size: self.config.chunk_size,
            failed: false,
        }));

        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, content_type(&name))
            .header(header::CONTENT_LENGTH, length)
            .header(header::ACCEPT_RANGES, "bytes");
        if let Some(range) = range {
            builder = builder.header(header::CONTENT_RANGE, range.content_range(size));
        }
        if is_subtitle(&name) {
            builder = builder.header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
        }

        Ok(builder
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
    }

    async fn serve_vtt(
        &self,
        session: &Arc<Session>,
        file_index: usize,
    ) -> Result<Response, StreamingError> {
        let reader = session.open_reader(file_index).await?;
        let size = reader.size();
        let limit = self.config.max_subtitle_bytes;
        if size > limit {
            tracing::warn!(session_id = %session.id(), file_index, size, limit, "Subtitle too large");
            return Err(StreamingError::SubtitleTooLarge { size, limit });
        }

        let _guard = ReaderGuard::new(Arc::clone(session));
        let mut srt = Vec::with_capacity(size as usize);
        while (srt.len() as u64) < size {
            let want = (size - srt.len() as u64).min(self.config.chunk_size as u64) as usize;
            let chunk = reader.read_at(srt.len() as u64, want).await?;
            if chunk.is_empty() {
                break;
            }
            srt.extend_from_slice(&chunk);
            session.touch();
        }

        let vtt = srt_to_vtt(&String::from_utf8_lossy(&srt));
        Ok((
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("text/vtt")),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            ],
            vtt,
        )
            .into_response())
    }
}

fn unsatisfiable(size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [
            (header::CONTENT_RANGE, format!("bytes */{size}")),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
    )
        .into_response()
}

struct BodyState {
    reader: Box<dyn FileReader>,
    guard: ReaderGuard,
    position: u64,
    /// Exclusive
    end: u64,
    chunk_size: usize,
    failed: bool,
}

/// Reads `[position, end)` in chunks as the engine makes bytes available.
///
/// Yields at most one error, then ends. The reader and guard are dropped
/// with the stream, which happens when the body completes, fails or the
/// client goes away.
fn chunk_stream(state: BodyState) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    stream::unfold(state, |mut state| async move {
        if state.failed || state.position >= state.end {
            return None;
        }

        let want = (state.end - state.position).min(state.chunk_size as u64) as usize;
        match state.reader.read_at(state.position, want).await {
            Ok(bytes) if bytes.is_empty() => {
                state.failed = true;
                let error = std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("file ended at byte {}", state.position),
                );
                Some((Err(error), state))
            }
            Ok(bytes) => {
                state.position += bytes.len() as u64;
                state.guard.session().touch();
                Some((Ok(bytes), state))
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %state.guard.session().id(),
                    position = state.position,
                    error = %e,
                    "Stream read failed"
                );
                state.failed = true;
                Some((Err(std::io::Error::other(e)), state))
            }
        }
    })
}
