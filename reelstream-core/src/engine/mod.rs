//! Torrent engine adapter.
//!
//! The wire protocol lives outside this crate. An engine is launched once per
//! session with its own listening port, outbound dialer and scratch
//! directory, and is driven only through these traits. Implementations must
//! fail pending and future reads with [`EngineError::Closed`] after shutdown
//! instead of hanging or panicking.

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::network::Dialer;
use crate::torrent::{InfoHash, MagnetLink};

/// Everything an engine instance is constructed with.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Port leased for incoming peer connections
    pub listen_port: u16,
    /// Every outbound peer and tracker connection must be opened with
    /// [`Dialer::connect`], which routes it through the session's SOCKS5
    /// proxy when one was configured at creation
    pub dialer: Dialer,
    /// Scratch directory owned by the session; the engine may fill it freely
    pub storage_dir: PathBuf,
}

/// One file of a torrent as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentFile {
    pub index: usize,
    /// Path inside the torrent, components joined with `/`
    pub name: String,
    pub size: u64,
}

/// Metadata known once the engine has fetched the info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    pub name: String,
    pub files: Vec<TorrentFile>,
}

/// Creates engine instances.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Starts a new engine bound to the given port, dialer and directory.
    ///
    /// # Errors
    ///
    /// - `EngineError::Launch` - The engine could not start
    async fn launch(&self, options: EngineOptions) -> Result<Box<dyn TorrentEngine>, EngineError>;
}

/// A running engine instance, exclusively owned by one session.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Starts fetching the torrent behind a magnet link.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` - The engine was shut down
    async fn add_magnet(&self, magnet: &MagnetLink) -> Result<Arc<dyn TorrentHandle>, EngineError>;

    /// Stops all engine activity and closes its listener. Idempotent.
    ///
    /// # Errors
    ///
    /// - `EngineError::Shutdown` - Cleanup failed; the engine is still unusable
    async fn shutdown(&self) -> Result<(), EngineError>;
}

/// A torrent added to an engine.
#[async_trait]
pub trait TorrentHandle: Send + Sync {
    fn info_hash(&self) -> InfoHash;

    /// Resolves once metadata is known. May never resolve; callers bound it
    /// with a timeout.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` - The engine shut down while waiting
    async fn wait_for_metadata(&self) -> Result<TorrentInfo, EngineError>;

    /// Opens a positional reader over one file.
    ///
    /// # Errors
    ///
    /// - `EngineError::FileIndexOutOfRange` - No such file
    /// - `EngineError::Closed` - The engine was shut down
    async fn open_reader(&self, file_index: usize) -> Result<Box<dyn FileReader>, EngineError>;
}

/// Positional reads over a file that may still be downloading.
#[async_trait]
pub trait FileReader: Send + Sync {
    /// Reads up to `length` bytes at `offset`, waiting until they are
    /// downloaded. Returns fewer bytes only at end of file.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidRange` - `offset` is past the end of the file
    /// - `EngineError::Closed` - The engine shut down before or during the read
    /// - `EngineError::Io` - Reading downloaded data failed
    async fn read_at(&self, offset: u64, length: usize) -> Result<Bytes, EngineError>;

    /// Total file size in bytes.
    fn size(&self) -> u64;
}

/// Errors reported by engine implementations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine failed to start: {reason}")]
    Launch { reason: String },

    #[error("Engine is shut down")]
    Closed,

    #[error("File index {index} out of range ({count} files)")]
    FileIndexOutOfRange { index: usize, count: usize },

    #[error("Read at {offset} beyond file size {size}")]
    InvalidRange { offset: u64, size: u64 },

    #[error("Engine shutdown failed: {reason}")]
    Shutdown { reason: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
