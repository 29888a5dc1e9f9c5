//! Engine that "downloads" library entries into the session directory.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reelstream_core::config::SimulationConfig;
use reelstream_core::engine::{
    EngineError, EngineFactory, EngineOptions, FileReader, TorrentEngine, TorrentHandle,
    TorrentInfo,
};
use reelstream_core::torrent::{InfoHash, MagnetLink};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::library::{LibraryEntry, LibraryFile, find_entry, scan_library};

const COPY_CHUNK: usize = 64 * 1024;

/// Copy progress of one file: bytes written so far, or why copying stopped.
type Progress = Result<u64, String>;

/// Launches [`LibraryEngine`]s over one library directory.
#[derive(Debug, Clone)]
pub struct LibraryEngineFactory {
    config: SimulationConfig,
}

impl LibraryEngineFactory {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn library_dir(&self) -> &Path {
        &self.config.library_dir
    }

    /// Lists the torrents this factory can serve.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - The library directory cannot be read
    pub async fn catalog(&self) -> std::io::Result<Vec<LibraryEntry>> {
        let dir = self.config.library_dir.clone();
        tokio::task::spawn_blocking(move || scan_library(&dir))
            .await
            .map_err(std::io::Error::other)?
    }
}

#[async_trait]
impl EngineFactory for LibraryEngineFactory {
    async fn launch(&self, options: EngineOptions) -> Result<Box<dyn TorrentEngine>, EngineError> {
        let (closed, _) = watch::channel(false);

        let listener = if self.config.bind_listener {
            let listener = TcpListener::bind(("0.0.0.0", options.listen_port))
                .await
                .map_err(|e| EngineError::Launch {
                    reason: format!("cannot listen on port {}: {e}", options.listen_port),
                })?;
            Some(tokio::spawn(refuse_peers(listener, closed.subscribe())))
        } else {
            None
        };

        tracing::debug!(
            port = options.listen_port,
            path = %options.storage_dir.display(),
            proxied = options.dialer.is_proxied(),
            "Library engine started"
        );

        Ok(Box::new(LibraryEngine {
            config: self.config.clone(),
            storage_dir: options.storage_dir,
            closed,
            tasks: Mutex::new(listener.into_iter().collect()),
        }))
    }
}

/// Accepts and immediately drops incoming peer connections until closed.
async fn refuse_peers(listener: TcpListener, mut closed: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "Refusing simulated peer connection");
                    drop(stream);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Listener accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            _ = async { closed.wait_for(|closed| *closed).await.map(|_| ()) } => break,
        }
    }
}

/// One simulated engine instance.
///
/// Dropping it without calling `shutdown` still stops its tasks.
pub struct LibraryEngine {
    config: SimulationConfig,
    storage_dir: PathBuf,
    closed: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LibraryEngine {
    fn stop(&self) -> Vec<JoinHandle<()>> {
        self.closed.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        tasks
    }
}

#[async_trait]
impl TorrentEngine for LibraryEngine {
    async fn add_magnet(&self, magnet: &MagnetLink) -> Result<Arc<dyn TorrentHandle>, EngineError> {
        if *self.closed.borrow() {
            return Err(EngineError::Closed);
        }

        let dir = self.config.library_dir.clone();
        let info_hash = magnet.info_hash;
        let entry = tokio::task::spawn_blocking(move || find_entry(&dir, info_hash))
            .await
            .map_err(std::io::Error::other)??;

        let ready_at = Instant::now() + self.config.metadata_delay;
        let Some(entry) = entry else {
            tracing::debug!(%info_hash, "Magnet not in library, metadata will never arrive");
            return Ok(Arc::new(LibraryTorrent {
                info_hash,
                entry: None,
                ready_at,
                files: Vec::new(),
                closed: self.closed.subscribe(),
            }));
        };

        let mut senders = Vec::with_capacity(entry.files.len());
        let mut files = Vec::with_capacity(entry.files.len());
        for file in &entry.files {
            let (tx, rx) = watch::channel(Ok(0));
            senders.push(tx);
            files.push(DownloadingFile {
                path: self.storage_dir.join(&file.name),
                size: file.size,
                progress: rx,
            });
        }

        let copy = CopyJob {
            files: entry.files.clone(),
            destinations: files.iter().map(|file| file.path.clone()).collect(),
            progress: senders,
            rate: self.config.download_rate,
            ready_at,
        };
        self.tasks
            .lock()
            .push(tokio::spawn(copy.run(info_hash.to_string())));

        Ok(Arc::new(LibraryTorrent {
            info_hash,
            entry: Some(entry),
            ready_at,
            files,
            closed: self.closed.subscribe(),
        }))
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        for task in self.stop() {
            if let Err(e) = task.await
                && !e.is_cancelled()
            {
                return Err(EngineError::Shutdown {
                    reason: e.to_string(),
                });
            }
        }
        tracing::debug!(path = %self.storage_dir.display(), "Library engine stopped");
        Ok(())
    }
}

impl Drop for LibraryEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Copies every file of an entry at the configured rate once metadata is
/// known, publishing progress per file.
struct CopyJob {
    files: Vec<LibraryFile>,
    destinations: Vec<PathBuf>,
    progress: Vec<watch::Sender<Progress>>,
    rate: u64,
    ready_at: Instant,
}

impl CopyJob {
    async fn run(self, session_id: String) {
        tokio::time::sleep_until(self.ready_at).await;

        let started = Instant::now();
        let mut copied: u64 = 0;
        for ((file, destination), progress) in self
            .files
            .iter()
            .zip(&self.destinations)
            .zip(&self.progress)
        {
            if let Err(e) = self
                .copy_file(file, destination, progress, started, &mut copied)
                .await
            {
                tracing::warn!(
                    session_id = %session_id,
                    path = %destination.display(),
                    error = %e,
                    "Simulated download failed"
                );
                progress.send_replace(Err(e.to_string()));
            }
        }
        tracing::debug!(session_id = %session_id, bytes = copied, "Simulated download complete");
    }

    async fn copy_file(
        &self,
        file: &LibraryFile,
        destination: &Path,
        progress: &watch::Sender<Progress>,
        started: Instant,
        copied: &mut u64,
    ) -> std::io::Result<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut source = tokio::fs::File::open(&file.source).await?;
        let mut target = tokio::fs::File::create(destination).await?;

        let mut buffer = vec![0u8; COPY_CHUNK];
        let mut written: u64 = 0;
        while written < file.size {
            let read = source.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            target.write_all(&buffer[..read]).await?;
            target.flush().await?;
            written += read as u64;
            *copied += read as u64;
            progress.send_replace(Ok(written));

            if let Some(due) = throttle_deadline(started, *copied, self.rate) {
                tokio::time::sleep_until(due).await;
            }
        }

        if written < file.size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("source shrank to {written} of {} bytes", file.size),
            ));
        }
        Ok(())
    }
}

/// When the transfer of `copied` bytes should finish at `rate` bytes/s.
fn throttle_deadline(started: Instant, copied: u64, rate: u64) -> Option<Instant> {
    if rate == 0 || rate == u64::MAX {
        return None;
    }
    Some(started + Duration::from_secs_f64(copied as f64 / rate as f64))
}

struct DownloadingFile {
    path: PathBuf,
    size: u64,
    progress: watch::Receiver<Progress>,
}

struct LibraryTorrent {
    info_hash: InfoHash,
    entry: Option<LibraryEntry>,
    ready_at: Instant,
    files: Vec<DownloadingFile>,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl TorrentHandle for LibraryTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    async fn wait_for_metadata(&self) -> Result<TorrentInfo, EngineError> {
        let mut closed = self.closed.clone();
        let ready = async {
            tokio::time::sleep_until(self.ready_at).await;
            match &self.entry {
                Some(entry) => entry.info(),
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
        let file = self
            .files
            .get(file_index)
            .ok_or(EngineError::FileIndexOutOfRange {
                index: file_index,
                count: self.files.len(),
            })?;
        Ok(Box::new(LibraryReader {
            path: file.path.clone(),
            size: file.size,
            progress: file.progress.clone(),
            closed: self.closed.clone(),
        }))
    }
}

/// Reads a file that is still being copied, waiting for missing bytes.
struct LibraryReader {
    path: PathBuf,
    size: u64,
    progress: watch::Receiver<Progress>,
    closed: watch::Receiver<bool>,
}

impl LibraryReader {
    async fn wait_until_written(&self, end: u64) -> Result<(), EngineError> {
        let mut progress = self.progress.clone();
        let mut closed = self.closed.clone();

        let available = tokio::select! {
            state = progress.wait_for(|state| state.as_ref().map_or(true, |written| *written >= end)) => {
                state.map(|state| (*state).clone()).map_err(|_| EngineError::Closed)?
            }
            _ = closed.wait_for(|closed| *closed) => return Err(EngineError::Closed),
        };

        available
            .map(|_| ())
            .map_err(|reason| EngineError::Io(std::io::Error::other(reason)))
    }
}

#[async_trait]
impl FileReader for LibraryReader {
    async fn read_at(&self, offset: u64, length: usize) -> Result<Bytes, EngineError> {
        if *self.closed.borrow() {
            return Err(EngineError::Closed);
        }
        if offset > self.size {
            return Err(EngineError::InvalidRange {
                offset,
                size: self.size,
            });
        }
        let end = offset.saturating_add(length as u64).min(self.size);
        if end == offset {
            return Ok(Bytes::new());
        }

        self.wait_until_written(end).await?;

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; (end - offset) as usize];
        file.read_exact(&mut buffer).await?;

        if *self.closed.borrow() {
            return Err(EngineError::Closed);
        }
        Ok(Bytes::from(buffer))
    }

    fn size(&self) -> u64 {
        self.size
    }
}
