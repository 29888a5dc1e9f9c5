//! Reelstream Search - Prowlarr and Jackett indexer search
//!
//! Queries the configured indexers through the shared HTTP transport and
//! normalizes their releases into typed [`SearchResult`]s carrying either a
//! magnet URI or an indexer download link.

pub mod errors;
pub mod providers;
pub mod service;
pub mod types;

pub use errors::MediaSearchError;
pub use providers::{IndexerClient, JackettClient, ProwlarrClient};
pub use service::MediaSearchService;
pub use types::{IndexerKind, SearchResult, format_size};

/// Convenience type alias for Results with MediaSearchError.
pub type Result<T> = std::result::Result<T, MediaSearchError>;
