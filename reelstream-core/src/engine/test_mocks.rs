//! In-memory engine for exercising the session layer in tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{
    EngineError, EngineFactory, EngineOptions, FileReader, TorrentEngine, TorrentFile,
    TorrentHandle, TorrentInfo,
};
use crate::network::Dialer;
use crate::torrent::{InfoHash, MagnetLink};

/// Torrent contents served by the mock engine.
#[derive(Debug, Clone)]
pub struct MockTorrent {
    pub name: String,
    pub files: Vec<(String, Bytes)>,
}

impl MockTorrent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Vec::new(),
        }
    }

    pub fn with_file(mut self, name: &str, data: impl Into<Bytes>) -> Self {
        self.files.push((name.to_string(), data.into()));
        self
    }

    fn info(&self) -> TorrentInfo {
        TorrentInfo {
            name: self.name.clone(),
            files: self
                .files
                .iter()
                .enumerate()
                .map(|(index, (name, data))| TorrentFile {
                    index,
                    name: name.clone(),
                    size: data.len() as u64,
                })
                .collect(),
        }
    }
}

/// Record of one engine launch.
#[derive(Debug, Clone)]
pub struct MockLaunch {
    pub listen_port: u16,
    pub storage_dir: PathBuf,
    pub proxied: bool,
    pub dialer: Dialer,
}

#[derive(Debug, Default)]
struct MockState {
    catalog: Mutex<HashMap<InfoHash, MockTorrent>>,
    launches: Mutex<Vec<MockLaunch>>,
    live_engines: AtomicUsize,
    metadata_delay: Mutex<Duration>,
    fail_launch: AtomicBool,
}

/// Engine factory whose torrents are registered in memory.
///
/// Unknown info hashes never produce metadata. Launching writes a marker
/// file into the storage directory so cleanup of non-empty directories is
/// exercised.
#[derive(Debug, Clone, Default)]
pub struct MockEngineFactory {
    state: Arc<MockState>,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a torrent and returns its magnet link.
    pub fn add_torrent(&self, info_hash: InfoHash, torrent: MockTorrent) -> MagnetLink {
        let mut magnet = MagnetLink::new(info_hash);
        magnet.display_name = Some(torrent.name.clone());
        self.state.catalog.lock().insert(info_hash, torrent);
        magnet
    }

    pub fn set_metadata_delay(&self, delay: Duration) {
        *self.state.metadata_delay.lock() = delay;
    }

    pub fn fail_launches(&self, fail: bool) {
        self.state.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn launches(&self) -> Vec<MockLaunch> {
        self.state.launches.lock().clone()
    }

    /// Engines launched and not yet shut down.
    pub fn live_engines(&self) -> usize {
        self.state.live_engines.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn launch(&self, options: EngineOptions) -> Result<Box<dyn TorrentEngine>, EngineError> {
        if self.state.fail_launch.load(Ordering::SeqCst) {
            return Err(EngineError::Launch {
                reason: "mock launch failure".to_string(),
            });
        }

        tokio::fs::write(options.storage_dir.join("engine.lock"), b"mock").await?;

        self.state.launches.lock().push(MockLaunch {
            listen_port: options.listen_port,
            storage_dir: options.storage_dir.clone(),
            proxied: options.dialer.is_proxied(),
            dialer: options.dialer.clone(),
        });
        self.state.live_engines.fetch_add(1, Ordering::SeqCst);

        let (closed_tx, _) = watch::channel(false);
        Ok(Box::new(MockEngine {
            state: Arc::clone(&self.state),
            closed: closed_tx,
        }))
    }
}

struct MockEngine {
    state: Arc<MockState>,
    closed: watch::Sender<bool>,
}

#[async_trait]
impl TorrentEngine for MockEngine {
    async fn add_magnet(&self, magnet: &MagnetLink) -> Result<Arc<dyn TorrentHandle>, EngineError> {
        if *self.closed.borrow() {
            return Err(EngineError::Closed);
        }
        let torrent = self.state.catalog.lock().get(&magnet.info_hash).cloned();
        Ok(Arc::new(MockHandle {
            info_hash: magnet.info_hash,
            torrent,
            metadata_delay: *self.state.metadata_delay.lock(),
            closed: self.closed.subscribe(),
        }))
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        let was_open = !self.closed.send_replace(true);
        if was_open {
            self.state.live_engines.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct MockHandle {
    info_hash: InfoHash,
    torrent: Option<MockTorrent>,
    metadata_delay: Duration,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl TorrentHandle for MockHandle {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    async fn wait_for_metadata(&self) -> Result<TorrentInfo, EngineError> {
        let mut closed = self.closed.clone();
        let ready = async {
            tokio::time::sleep(self.metadata_delay).await;
            match &self.torrent {
                Some(torrent) => torrent.info(),
                None => futures::future::pending().await,
            }
        };

        tokio::select! {
            info = ready => Ok(info),
            _ = closed.wait_for(|closed| *closed) => Err(EngineError::Closed),
        }
    }

    async fn open_reader(&self, file_index: usize) -> Result<Box<dyn FileReader>, EngineError> {
        if *self.closed.borrow() {
            return Err(EngineError::Closed);
        }
        let files = self.torrent.as_ref().map(|t| t.files.as_slice()).unwrap_or_default();
        let (_, data) = files
            .get(file_index)
            .ok_or(EngineError::FileIndexOutOfRange {
                index: file_index,
                count: files.len(),
            })?;
        Ok(Box::new(MockReader {
            data: data.clone(),
            closed: self.closed.clone(),
        }))
    }
}

struct MockReader {
    data: Bytes,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl FileReader for MockReader {
    async fn read_at(&self, offset: u64, length: usize) -> Result<Bytes, EngineError> {
        if *self.closed.borrow() {
            return Err(EngineError::Closed);
        }
        let size = self.data.len() as u64;
        if offset > size {
            return Err(EngineError::InvalidRange { offset, size });
        }
        let start = offset as usize;
        let end = start.saturating_add(length).min(self.data.len());
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
