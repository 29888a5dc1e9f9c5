//! Progressive HTTP delivery of in-progress downloads.
//!
//! The [`StreamingResponder`] serves one file of a session, either as a
//! byte-range stream read from the engine as data arrives, or, for SRT
//! subtitles requested as WebVTT, as a converted document.

pub mod range;
pub mod responder;
pub mod subtitles;

use std::path::Path;

pub use range::{ByteRange, RangeOutcome, parse_range};
pub use responder::StreamingResponder;
pub use subtitles::srt_to_vtt;

use crate::ErrorKind;
use crate::engine::EngineError;

/// Errors from serving file content.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error("File index {index} out of range ({count} files)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Subtitle file is {size} bytes, limit is {limit}")]
    SubtitleTooLarge { size: u64, limit: u64 },

    #[error("Failed to read file: {0}")]
    Engine(#[from] EngineError),
}

impl StreamingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamingError::IndexOutOfRange { .. } => ErrorKind::InvalidInput,
            StreamingError::SubtitleTooLarge { .. } => ErrorKind::ResourceExhaustion,
            // Session torn down between lookup and read
            StreamingError::Engine(EngineError::Closed) => ErrorKind::NotFound,
            StreamingError::Engine(_) => ErrorKind::InternalFailure,
        }
    }
}

/// Lowercase extension of a file name, without the dot.
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// MIME type served for a torrent file.
pub fn content_type(name: &str) -> String {
    match extension(name).as_deref() {
        Some("mp4") => "video/mp4".to_string(),
        Some("webm") => "video/webm".to_string(),
        Some("mkv") => "video/x-matroska".to_string(),
        Some("avi") => "video/x-msvideo".to_string(),
        Some("mov") => "video/quicktime".to_string(),
        Some("srt") | Some("sub") => "text/plain".to_string(),
        Some("vtt") => "text/vtt".to_string(),
        _ => mime_guess::from_path(name)
            .iter()
            .find(|mime| mime.type_() == "video" || mime.type_() == "audio")
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

/// Subtitle files are served with a permissive CORS header so players on
/// other origins can load them.
pub fn is_subtitle(name: &str) -> bool {
    matches!(extension(name).as_deref(), Some("srt" | "sub" | "vtt"))
}
