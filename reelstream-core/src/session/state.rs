use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::engine::{EngineError, FileReader, TorrentEngine, TorrentFile, TorrentHandle};
use crate::network::PortLease;
use crate::settings::Settings;
use crate::torrent::InfoHash;

/// Everything a session must give back when it is destroyed.
pub(crate) struct SessionResources {
    pub(crate) engine: Box<dyn TorrentEngine>,
    pub(crate) torrent: Arc<dyn TorrentHandle>,
    pub(crate) port: PortLease,
    pub(crate) storage: TempDir,
}

/// One active torrent download bound to one magnet link.
///
/// Not `Clone`: the manager shares it through `Arc` and is the only party
/// that tears it down.
pub struct Session {
    id: String,
    info_hash: InfoHash,
    name: String,
    files: Vec<TorrentFile>,
    listen_port: u16,
    storage_path: PathBuf,
    settings: Arc<Settings>,
    created_at: DateTime<Utc>,
    last_used: Mutex<Instant>,
    open_readers: AtomicUsize,
    resources: Mutex<Option<SessionResources>>,
}

impl Session {
    pub(crate) fn new(
        info_hash: InfoHash,
        name: String,
        files: Vec<TorrentFile>,
        settings: Arc<Settings>,
        resources: SessionResources,
    ) -> Self {
        Self {
            id: info_hash.to_string(),
            info_hash,
            name,
            files,
            listen_port: resources.port.port(),
            storage_path: resources.storage.path().to_path_buf(),
            settings,
            created_at: Utc::now(),
            last_used: Mutex::new(Instant::now()),
            open_readers: AtomicUsize::new(0),
            resources: Mutex::new(Some(resources)),
        }
    }

    /// Lowercase hex info hash.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn files(&self) -> &[TorrentFile] {
        &self.files
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Settings snapshot taken when the session was created.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Marks the session as used now. Never moves the timestamp backwards.
    pub fn touch(&self) {
        let now = Instant::now();
        let mut last_used = self.last_used.lock();
        if now > *last_used {
            *last_used = now;
        }
    }

    pub fn last_used(&self) -> Instant {
        *self.last_used.lock()
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used())
    }

    pub fn open_readers(&self) -> usize {
        self.open_readers.load(Ordering::SeqCst)
    }

    /// False once the session has been torn down.
    pub fn is_active(&self) -> bool {
        self.resources.lock().is_some()
    }

    /// Opens a reader over one file of the torrent.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` - The session was torn down
    /// - `EngineError::FileIndexOutOfRange` - No such file
    pub async fn open_reader(&self, file_index: usize) -> Result<Box<dyn FileReader>, EngineError> {
        let torrent = self
            .resources
            .lock()
            .as_ref()
            .map(|resources| Arc::clone(&resources.torrent))
            .ok_or(EngineError::Closed)?;
        torrent.open_reader(file_index).await
    }

    /// Stops the engine, releases the port and deletes the scratch
    /// directory. Every step runs even if an earlier one fails; failures are
    /// logged. Returns false if the session was already torn down.
    pub(crate) async fn release(&self) -> bool {
        let Some(resources) = self.resources.lock().take() else {
            return false;
        };
        let SessionResources {
            engine,
            torrent,
            port,
            storage,
        } = resources;

        drop(torrent);
        if let Err(e) = engine.shutdown().await {
            tracing::warn!(session_id = %self.id, error = %e, "Engine shutdown failed");
        }
        drop(engine);
        drop(port);

        let path = storage.path().to_path_buf();
        match tokio::task::spawn_blocking(move || storage.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id = %self.id,
                    path = %path.display(),
                    error = %e,
                    "Failed to delete session storage"
                );
            }
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "Storage cleanup task failed");
            }
        }

        tracing::info!(
            session_id = %self.id,
            port = self.listen_port,
            "Session torn down"
        );
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("files", &self.files.len())
            .field("listen_port", &self.listen_port)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Counts an open streaming reader against its session and keeps the
/// session fresh while bytes flow.
#[derive(Debug)]
pub struct ReaderGuard {
    session: Arc<Session>,
}

impl ReaderGuard {
    pub fn new(session: Arc<Session>) -> Self {
        session.open_readers.fetch_add(1, Ordering::SeqCst);
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.session.open_readers.fetch_sub(1, Ordering::SeqCst);
    }
}
